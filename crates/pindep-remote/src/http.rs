use crate::{RemoteBinary, RemoteConfig, RemoteError, RemoteSource};
use pindep_cache::BinaryInfo;
use pindep_schema::{parse_recipe_str, PackageId, PackageRef, Recipe};
use std::io::Read;

/// HTTP remote.
///
/// REST layout under the configured base URL:
/// - `GET|PUT /v1/recipes/<name>/<version>/recipe.toml`
/// - `GET|PUT /v1/packages/<name>/<version>/<package_id>/package.toml`
/// - `GET|PUT /v1/packages/<name>/<version>/<package_id>/package.tar`
pub struct HttpRemote {
    config: RemoteConfig,
    agent: ureq::Agent,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig) -> Self {
        let agent = ureq::Agent::new_with_defaults();
        Self { config, agent }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn recipe_url(&self, reference: &PackageRef) -> String {
        format!(
            "{}/v1/recipes/{}/{}/recipe.toml",
            self.config.base_url(),
            reference.name,
            reference.version
        )
    }

    fn package_url(&self, reference: &PackageRef, package_id: &PackageId, file: &str) -> String {
        format!(
            "{}/v1/packages/{}/{}/{}/{file}",
            self.config.base_url(),
            reference.name,
            reference.version,
            package_id
        )
    }

    fn do_put(&self, url: &str, content_type: &str, data: &[u8]) -> Result<(), RemoteError> {
        let mut req = self
            .agent
            .put(url)
            .header("Content-Type", content_type)
            .header("X-Pindep-Protocol", &crate::PROTOCOL_VERSION.to_string());
        if let Some(ref token) = self.config.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        match req.send(data) {
            Ok(_) => Ok(()),
            Err(ureq::Error::StatusCode(code)) => {
                Err(RemoteError::Http(format!("HTTP {code} for PUT {url}")))
            }
            Err(e) => Err(RemoteError::Http(e.to_string())),
        }
    }

    /// GET a resource; `Ok(None)` on 404.
    fn do_get(&self, url: &str) -> Result<Option<Vec<u8>>, RemoteError> {
        let mut req = self
            .agent
            .get(url)
            .header("X-Pindep-Protocol", &crate::PROTOCOL_VERSION.to_string());
        if let Some(ref token) = self.config.auth_token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }
        let resp = match req.call() {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(404)) => return Ok(None),
            Err(ureq::Error::StatusCode(code)) => {
                return Err(RemoteError::Http(format!("HTTP {code} for {url}")));
            }
            Err(e) => return Err(RemoteError::Http(e.to_string())),
        };

        let mut reader = resp.into_body().into_reader();
        let mut body = Vec::new();
        reader
            .read_to_end(&mut body)
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(Some(body))
    }

    fn get_text(&self, url: &str) -> Result<Option<String>, RemoteError> {
        let Some(body) = self.do_get(url)? else {
            return Ok(None);
        };
        String::from_utf8(body)
            .map(Some)
            .map_err(|e| RemoteError::InvalidResponse(format!("{url}: {e}")))
    }
}

impl RemoteSource for HttpRemote {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn fetch_recipe(&self, reference: &PackageRef) -> Result<Option<Recipe>, RemoteError> {
        let url = self.recipe_url(reference);
        tracing::debug!("GET {url}");
        let Some(text) = self.get_text(&url)? else {
            return Ok(None);
        };
        let recipe = parse_recipe_str(&text)?;
        if recipe.reference() != *reference {
            return Err(RemoteError::InvalidResponse(format!(
                "{url} served recipe for {}",
                recipe.reference()
            )));
        }
        Ok(Some(recipe))
    }

    fn fetch_binary(
        &self,
        reference: &PackageRef,
        package_id: &PackageId,
    ) -> Result<Option<RemoteBinary>, RemoteError> {
        let info_url = self.package_url(reference, package_id, "package.toml");
        tracing::debug!("GET {info_url}");
        let Some(text) = self.get_text(&info_url)? else {
            return Ok(None);
        };
        let info = BinaryInfo::from_toml(&text)?;
        if info.reference != *reference || info.package_id != *package_id {
            return Err(RemoteError::InvalidResponse(format!(
                "{info_url} describes {} {}",
                info.reference,
                info.package_id.short()
            )));
        }

        let archive_url = self.package_url(reference, package_id, "package.tar");
        tracing::debug!("GET {archive_url}");
        let archive = self
            .do_get(&archive_url)?
            .ok_or_else(|| RemoteError::NotFound(archive_url.clone()))?;
        Ok(Some(RemoteBinary { info, archive }))
    }

    fn upload_recipe(&self, recipe: &Recipe) -> Result<(), RemoteError> {
        let url = self.recipe_url(&recipe.reference());
        let body = recipe.to_toml()?;
        tracing::debug!("PUT {url} ({} bytes)", body.len());
        self.do_put(&url, "application/toml", body.as_bytes())
    }

    fn upload_binary(&self, info: &BinaryInfo, archive: &[u8]) -> Result<(), RemoteError> {
        // Archive first: a reader that finds package.toml can always fetch the tar.
        let archive_url = self.package_url(&info.reference, &info.package_id, "package.tar");
        tracing::debug!("PUT {archive_url} ({} bytes)", archive.len());
        self.do_put(&archive_url, "application/x-tar", archive)?;

        let info_url = self.package_url(&info.reference, &info.package_id, "package.toml");
        let body = info.to_toml()?;
        tracing::debug!("PUT {info_url} ({} bytes)", body.len());
        self.do_put(&info_url, "application/toml", body.as_bytes())
    }
}

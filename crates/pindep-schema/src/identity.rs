use crate::reference::PackageRef;
use crate::settings::Settings;
use crate::types::{PackageId, RecipeRevision};

/// Compute the identity of one binary of a recipe.
///
/// The id covers:
/// - the exact `name/version`
/// - the recipe revision, so any recipe edit yields new binaries
/// - the settings key (only the settings the recipe declares), in canonical order
/// - the resolved transitive requirement references, sorted
///
/// Dependency *package ids* are deliberately not part of the input: a
/// dependency rebuilt for the same reference does not invalidate dependents.
pub fn compute_package_id(
    reference: &PackageRef,
    revision: &RecipeRevision,
    settings_key: &Settings,
    dependencies: &[PackageRef],
) -> PackageId {
    let mut hasher = blake3::Hasher::new();

    hasher.update(format!("ref:{reference}\n").as_bytes());
    hasher.update(format!("rrev:{revision}\n").as_bytes());

    for (name, value) in settings_key.iter() {
        hasher.update(format!("setting:{name}={value}\n").as_bytes());
    }

    let mut deps: Vec<String> = dependencies.iter().map(ToString::to_string).collect();
    deps.sort();
    deps.dedup();
    for dep in &deps {
        hasher.update(format!("dep:{dep}\n").as_bytes());
    }

    PackageId::new(hasher.finalize().to_hex().to_string())
}

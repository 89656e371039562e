use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{TierContext, TierKind, TierResult, VersionTier};
use crate::models::{Confidence, ResolvedVersion, VersionSource};
use crate::package_name::unscoped;
use crate::tree::SourceTree;

static NAMED_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?P<name>@?[A-Za-z0-9][\w.\-]*(?:/[\w.\-]+)?)\s+(?:-\s+)?v?(?P<version>\d+\.\d+\.\d+(?:-[0-9A-Za-z.\-]+)?)",
    )
    .unwrap()
});
static VERSION_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"@version\s+v?(\d+\.\d+\.\d+(?:-[0-9A-Za-z.\-]+)?)").unwrap());

/// Leading comment block of a file, if it opens with one
fn leading_comment(content: &str) -> Option<&str> {
    let trimmed = content.trim_start();
    if let Some(body) = trimmed.strip_prefix("/*") {
        let end = body.find("*/").unwrap_or(body.len());
        return Some(&body[..end]);
    }
    if trimmed.starts_with("//") {
        let end = trimmed
            .lines()
            .take_while(|l| l.trim_start().starts_with("//"))
            .map(|l| l.len() + 1)
            .sum::<usize>()
            .min(trimmed.len());
        return Some(trimmed.get(..end).unwrap_or(trimmed));
    }
    None
}

/// Version a banner attributes to `name` itself
pub fn banner_version(banner: &str, name: &str) -> Option<String> {
    let short = unscoped(name);
    let names_package = |candidate: &str| {
        candidate.eq_ignore_ascii_case(name) || candidate.eq_ignore_ascii_case(short)
    };

    for caps in NAMED_VERSION.captures_iter(banner) {
        if names_package(&caps["name"]) {
            return Some(caps["version"].to_string());
        }
    }

    let lower = banner.to_ascii_lowercase();
    if lower.contains(&short.to_ascii_lowercase()) {
        if let Some(caps) = VERSION_TAG.captures(banner) {
            return Some(caps[1].to_string());
        }
    }
    None
}

/// Tier 3: license/version banners naming the package.
///
/// Off by default. A banner only counts when it names the package it is
/// found in, so a bundled sub-dependency's banner is not attributed to its
/// parent.
#[derive(Debug, Default, Clone, Copy)]
pub struct BannerTier;

impl BannerTier {
    /// Creates a new BannerTier
    pub fn new() -> Self {
        BannerTier
    }

    fn scan(tree: &SourceTree, name: &str) -> Option<String> {
        tree.package_files(name)
            .into_iter()
            .filter_map(|f| leading_comment(&f.content))
            .find_map(|banner| banner_version(banner, name))
    }
}

#[async_trait]
impl VersionTier for BannerTier {
    fn kind(&self) -> TierKind {
        TierKind::Banner
    }

    async fn resolve(&self, pending: &[String], ctx: &TierContext<'_>) -> TierResult {
        pending
            .iter()
            .filter_map(|name| {
                Self::scan(ctx.tree, name).map(|version| {
                    (
                        name.clone(),
                        ResolvedVersion::new(version, Confidence::High, VersionSource::Banner),
                    )
                })
            })
            .collect()
    }
}

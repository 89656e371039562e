//! End-to-end pipeline behaviour against an in-memory registry

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use depscout_registry::{PackageMetadata, RegistryClient, RegistryError, VersionDetail};
use depscout_resolve::{
    ClassificationReason, Confidence, FingerprintOptions, FingerprintOracle, MemoryRunCache,
    Phase, ProgressReporter, RecoveredFile, ResolvedVersion, ResolverConfig, SourceTree,
    TierKind, VersionPipeline, VersionSource,
};

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeRegistry {
    packages: BTreeMap<String, PackageMetadata>,
    unreachable: BTreeSet<String>,
    calls: AtomicUsize,
}

impl FakeRegistry {
    fn publish(mut self, name: &str, latest: Option<&str>, versions: &[(&str, &[(&str, &str)])]) -> Self {
        let mut meta = versions.iter().fold(PackageMetadata::new(name), |m, (v, peers)| {
            m.with_version(*v, VersionDetail::with_peers(peers.iter().copied()))
        });
        if let Some(latest) = latest {
            meta.dist_tags.insert("latest".to_string(), latest.to_string());
        }
        self.packages.insert(name.to_string(), meta);
        self
    }

    fn unreachable(mut self, name: &str) -> Self {
        self.unreachable.insert(name.to_string());
        self
    }

    fn check(&self, name: &str) -> Result<Option<&PackageMetadata>, RegistryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.contains(name) {
            return Err(RegistryError::RetryLimitExceeded { attempts: 3 });
        }
        Ok(self.packages.get(name))
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    async fn package_exists(&self, name: &str) -> depscout_registry::Result<bool> {
        Ok(self.check(name)?.is_some())
    }

    async fn version_exists(&self, name: &str, version: &str) -> depscout_registry::Result<bool> {
        Ok(self.check(name)?.is_some_and(|m| m.has_version(version)))
    }

    async fn latest_version(&self, name: &str) -> depscout_registry::Result<Option<String>> {
        Ok(self.check(name)?.and_then(|m| m.latest().map(str::to_string)))
    }

    async fn package_metadata(&self, name: &str) -> depscout_registry::Result<Option<PackageMetadata>> {
        Ok(self.check(name)?.cloned())
    }
}

/// Suggests the same version for every package it is asked about
struct FixedOracle(&'static str);

#[async_trait]
impl FingerprintOracle for FixedOracle {
    async fn fingerprint_match(
        &self,
        _name: &str,
        _files: &[RecoveredFile],
        _options: &FingerprintOptions,
    ) -> depscout_resolve::Result<Option<ResolvedVersion>> {
        Ok(Some(ResolvedVersion::new(
            self.0,
            Confidence::High,
            VersionSource::Fingerprint,
        )))
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn manifest(name: &str, version: &str) -> String {
    format!(r#"{{"name":"{name}","version":"{version}"}}"#)
}

fn react_app() -> SourceTree {
    SourceTree::from_files([
        RecoveredFile::new(
            "src/index.tsx",
            "import React from 'react';\n\
             import { createRoot } from 'react-dom/client';\n\
             import Header from 'site-kit';\n\
             import { login } from '@corp/auth';",
        ),
        RecoveredFile::new("navigation/site-kit/src/index.ts", "export default function Header() {}"),
        RecoveredFile::new("node_modules/react/package.json", manifest("react", "18.2.0")),
        RecoveredFile::new("node_modules/react/index.js", "module.exports = {};"),
        RecoveredFile::new("node_modules/@corp/auth/package.json", manifest("@corp/auth", "1.2.3")),
        RecoveredFile::new("node_modules/@corp/auth/index.js", "export function login() {}"),
    ])
}

fn react_registry() -> FakeRegistry {
    FakeRegistry::default()
        .publish("react", Some("18.3.1"), &[("17.0.2", &[]), ("18.2.0", &[]), ("18.3.1", &[])])
        .publish(
            "react-dom",
            Some("18.3.1"),
            &[
                ("17.0.2", &[("react", "17.0.2")]),
                ("18.2.0", &[("react", "^18.2.0")]),
                ("18.3.1", &[("react", "^18.3.1")]),
            ],
        )
        .publish("site-kit", Some("4.0.0"), &[("4.0.0", &[])])
}

fn pipeline(registry: FakeRegistry) -> VersionPipeline {
    VersionPipeline::builder(Arc::new(registry))
        .build()
        .expect("default config is valid")
}

// ============================================================================
// Classification
// ============================================================================

#[tokio::test]
async fn test_workspace_package_is_internal_even_when_published() {
    let output = pipeline(react_registry()).run(&react_app()).await.unwrap();

    let site_kit = &output.records["site-kit"];
    assert!(site_kit.is_private);
    assert!(site_kit.version.is_none());
    assert_eq!(
        output.classification.details["site-kit"].reason,
        ClassificationReason::Workspace
    );
    assert_eq!(
        output.workspace_roots.get("site-kit").map(|r| r.path.as_str()),
        Some("navigation/site-kit")
    );
}

#[tokio::test]
async fn test_unpublished_installed_package_is_private_and_unversioned() {
    let output = pipeline(react_registry()).run(&react_app()).await.unwrap();

    let auth = &output.records["@corp/auth"];
    assert!(auth.is_private);
    assert!(auth.version.is_none(), "private packages are never versioned");
    assert_eq!(
        output.classification.details["@corp/auth"].reason,
        ClassificationReason::PrivateRegistry
    );
    assert_eq!(output.stats.private, 2);
}

#[tokio::test]
async fn test_unreachable_registry_assumes_external() {
    let tree = SourceTree::from_files([RecoveredFile::new("src/a.ts", "import 'flaky';")]);
    let registry = FakeRegistry::default().unreachable("flaky");
    let output = pipeline(registry).run(&tree).await.unwrap();

    assert!(output.classification.external.contains("flaky"));
    assert_eq!(
        output.classification.details["flaky"].reason,
        ClassificationReason::UnknownExternal
    );
    assert!(!output.records["flaky"].is_private);
}

#[tokio::test]
async fn test_registry_checks_disabled_never_calls_registry_for_classification() {
    let tree = SourceTree::from_files([RecoveredFile::new("src/a.ts", "import 'left-pad';")]);
    let registry = Arc::new(FakeRegistry::default());
    let config = ResolverConfig {
        registry_checks: false,
        enable_peer_inference: false,
        enable_validation: false,
        ..Default::default()
    };
    let output = VersionPipeline::builder(registry.clone())
        .config(config)
        .build()
        .unwrap()
        .run(&tree)
        .await
        .unwrap();

    assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        output.classification.details["left-pad"].reason,
        ClassificationReason::UnknownExternal
    );
}

// ============================================================================
// Resolution tiers
// ============================================================================

#[tokio::test]
async fn test_manifest_version_beats_later_fingerprint() {
    let tree = SourceTree::from_files([
        RecoveredFile::new("src/a.ts", "import lib from 'lib';\nimport other from 'other';"),
        RecoveredFile::new("node_modules/lib/package.json", manifest("lib", "1.0.0")),
        RecoveredFile::new("node_modules/lib/index.js", "export default 1;"),
        RecoveredFile::new("node_modules/other/index.js", "export default 2;"),
    ]);
    let registry = FakeRegistry::default()
        .publish("lib", Some("1.0.1"), &[("1.0.0", &[]), ("1.0.1", &[])])
        .publish("other", Some("1.0.1"), &[("1.0.1", &[])]);

    let output = VersionPipeline::builder(Arc::new(registry))
        .fingerprint_oracle(Arc::new(FixedOracle("1.0.1")))
        .build()
        .unwrap()
        .run(&tree)
        .await
        .unwrap();

    let lib = &output.records["lib"];
    assert_eq!(lib.version.as_deref(), Some("1.0.0"));
    assert_eq!(lib.confidence, Some(Confidence::Exact));
    assert_eq!(lib.source, Some(VersionSource::PackageManifest));

    let other = &output.records["other"];
    assert_eq!(other.version.as_deref(), Some("1.0.1"));
    assert_eq!(other.source, Some(VersionSource::Fingerprint));
}

#[tokio::test]
async fn test_peer_inference_fills_react_dom() {
    let output = pipeline(react_registry()).run(&react_app()).await.unwrap();

    let react = &output.records["react"];
    assert_eq!(react.version.as_deref(), Some("18.2.0"));
    assert_eq!(react.source, Some(VersionSource::PackageManifest));

    let react_dom = &output.records["react-dom"];
    assert_eq!(react_dom.version.as_deref(), Some("18.2.0"));
    assert_eq!(react_dom.confidence, Some(Confidence::High));
    assert_eq!(react_dom.source, Some(VersionSource::PeerDep));

    let inference = &output.peer_results["react-dom"];
    assert_eq!(inference.inferred_from_peer_name, "react");
    assert_eq!(inference.peer_range, "^18.2.0");
}

#[tokio::test]
async fn test_latest_fallback_only_when_enabled() {
    let tree = SourceTree::from_files([RecoveredFile::new("src/a.ts", "import dayjs from 'dayjs';")]);
    let registry = || FakeRegistry::default().publish("dayjs", Some("1.11.10"), &[("1.11.10", &[])]);

    let without = pipeline(registry()).run(&tree).await.unwrap();
    assert!(without.records["dayjs"].version.is_none());
    assert_eq!(without.stats.unresolved, 1);

    let config = ResolverConfig {
        enable_latest_fallback: true,
        ..Default::default()
    };
    let with = VersionPipeline::builder(Arc::new(registry()))
        .config(config)
        .build()
        .unwrap()
        .run(&tree)
        .await
        .unwrap();
    let dayjs = &with.records["dayjs"];
    assert_eq!(dayjs.version.as_deref(), Some("1.11.10"));
    assert_eq!(dayjs.confidence, Some(Confidence::Unverified));
    assert_eq!(dayjs.source, Some(VersionSource::RegistryLatest));
}

#[tokio::test]
async fn test_banner_tier_is_opt_in() {
    let tree = SourceTree::from_files([
        RecoveredFile::new("src/a.ts", "import _ from 'lodash';"),
        RecoveredFile::new(
            "node_modules/lodash/lodash.js",
            "/*! lodash v4.17.21 | (c) OpenJS Foundation */\nvar _ = {};",
        ),
    ]);
    let registry = || FakeRegistry::default().publish("lodash", Some("4.17.21"), &[("4.17.21", &[])]);

    let default_run = pipeline(registry()).run(&tree).await.unwrap();
    assert!(default_run.records["lodash"].version.is_none());

    let config = ResolverConfig {
        enable_banner_detection: true,
        ..Default::default()
    };
    let banner_run = VersionPipeline::builder(Arc::new(registry()))
        .config(config)
        .build()
        .unwrap()
        .run(&tree)
        .await
        .unwrap();
    let lodash = &banner_run.records["lodash"];
    assert_eq!(lodash.version.as_deref(), Some("4.17.21"));
    assert_eq!(lodash.source, Some(VersionSource::Banner));
}

// ============================================================================
// Aliases and validation
// ============================================================================

#[tokio::test]
async fn test_alias_is_folded_into_published_name() {
    let tree = SourceTree::from_files([
        RecoveredFile::new("src/App.tsx", "import Button from 'design-kit';"),
        RecoveredFile::new(
            "node_modules/@acme/design-kit/package.json",
            manifest("@acme/design-kit", "2.0.0"),
        ),
        RecoveredFile::new("node_modules/@acme/design-kit/index.js", "export const Button = 1;"),
    ]);
    let registry = FakeRegistry::default().publish("@acme/design-kit", Some("2.0.0"), &[("2.0.0", &[])]);

    let output = pipeline(registry).run(&tree).await.unwrap();

    assert!(!output.records.contains_key("design-kit"));
    assert!(!output.classification.contains("design-kit"));
    let kit = &output.records["@acme/design-kit"];
    assert_eq!(kit.version.as_deref(), Some("2.0.0"));
    assert_eq!(kit.imported_from, vec!["src/App.tsx"]);
    assert_eq!(output.aliases.len(), 1);
    assert_eq!(output.aliases[0].alias, "design-kit");
}

#[tokio::test]
async fn test_alias_merges_into_existing_published_record() {
    let tree = SourceTree::from_files([
        RecoveredFile::new("src/a.ts", "import kit from '@acme/kit';"),
        RecoveredFile::new("src/b.ts", "import kit from 'kit';"),
        RecoveredFile::new("node_modules/@acme/kit/package.json", manifest("@acme/kit", "2.0.0")),
        RecoveredFile::new("node_modules/@acme/kit/index.js", "export default {};"),
    ]);
    let registry = FakeRegistry::default().publish("@acme/kit", Some("2.0.0"), &[("2.0.0", &[])]);

    let output = pipeline(registry).run(&tree).await.unwrap();

    assert_eq!(output.records.len(), 1);
    assert!(!output.records.contains_key("kit"));
    assert!(!output.classification.contains("kit"));
    let kit = &output.records["@acme/kit"];
    assert_eq!(kit.imported_from, vec!["src/a.ts", "src/b.ts"]);
    assert_eq!(kit.version.as_deref(), Some("2.0.0"));
    assert_eq!(output.aliases.len(), 1);
    assert_eq!(output.aliases[0].actual_name, "@acme/kit");
}

#[tokio::test]
async fn test_workspace_root_is_never_folded_into_scoped_package() {
    let tree = SourceTree::from_files([
        RecoveredFile::new("src/index.tsx", "import { Header } from 'site-kit';"),
        RecoveredFile::new("navigation/site-kit/src/index.ts", "export const Header = 1;"),
        RecoveredFile::new(
            "node_modules/@navigation/site-kit/package.json",
            manifest("@navigation/site-kit", "1.0.0"),
        ),
        RecoveredFile::new("node_modules/@navigation/site-kit/index.js", "export const Header = 1;"),
    ]);
    let registry = FakeRegistry::default()
        .publish("site-kit", Some("3.0.0"), &[("3.0.0", &[])])
        .publish("@navigation/site-kit", Some("1.0.0"), &[("1.0.0", &[])]);

    let output = pipeline(registry).run(&tree).await.unwrap();

    assert!(output.aliases.is_empty());
    assert!(!output.records.contains_key("@navigation/site-kit"));
    let site_kit = &output.records["site-kit"];
    assert!(site_kit.is_private);
    assert!(site_kit.version.is_none());
    assert_eq!(site_kit.imported_from, vec!["src/index.tsx"]);
    assert_eq!(
        output.classification.details["site-kit"].reason,
        ClassificationReason::Workspace
    );
}

#[tokio::test]
async fn test_validation_replaces_or_clears_unpublished_versions() {
    let tree = SourceTree::from_files([
        RecoveredFile::new("src/a.ts", "import app from '@scope/app';\nimport pin from 'ghostpin';"),
        RecoveredFile::new("node_modules/@scope/app/package.json", manifest("@scope/app", "11.3.1")),
        RecoveredFile::new("node_modules/ghostpin/package.json", manifest("ghostpin", "0.0.1")),
    ]);
    let registry = FakeRegistry::default()
        .publish("@scope/app", Some("11.4.0"), &[("11.4.0", &[])])
        .publish("ghostpin", None, &[]);

    let output = pipeline(registry).run(&tree).await.unwrap();

    let app = &output.records["@scope/app"];
    assert_eq!(app.version.as_deref(), Some("11.4.0"));
    assert_eq!(app.confidence, Some(Confidence::Unverified));
    assert_eq!(app.source, Some(VersionSource::RegistryLatest));

    let pin = &output.records["ghostpin"];
    assert!(pin.version.is_none());
    assert!(pin.confidence.is_none());

    assert_eq!(output.validation.replaced, vec!["@scope/app"]);
    assert_eq!(output.validation.cleared, vec!["ghostpin"]);
}

// ============================================================================
// Determinism, caching and progress
// ============================================================================

#[tokio::test]
async fn test_repeated_runs_are_identical() {
    let first = pipeline(react_registry()).run(&react_app()).await.unwrap();
    let second = pipeline(react_registry()).run(&react_app()).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first.records).unwrap(),
        serde_json::to_string(&second.records).unwrap()
    );
}

#[tokio::test]
async fn test_run_cache_serves_second_run() {
    let cache = Arc::new(MemoryRunCache::new());
    let pipeline = VersionPipeline::builder(Arc::new(react_registry()))
        .cache(cache.clone())
        .build()
        .unwrap();

    let first = pipeline.run(&react_app()).await.unwrap();
    assert!(!first.from_cache);
    assert_eq!(cache.len(), 1);

    let second = pipeline.run(&react_app()).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(first.records, second.records);
    assert_eq!(first.classification, second.classification);
}

#[tokio::test]
async fn test_progress_events_cover_every_checked_name() {
    let (reporter, mut rx) = ProgressReporter::channel();
    let pipeline = VersionPipeline::builder(Arc::new(react_registry()))
        .progress(reporter)
        .build()
        .unwrap();

    pipeline.run(&react_app()).await.unwrap();
    drop(pipeline);

    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }

    let classification: Vec<_> = events
        .iter()
        .filter(|e| e.phase == Phase::Classification)
        .collect();
    // site-kit is a workspace root and never reaches the registry
    assert_eq!(classification.len(), 3);
    assert!(classification.iter().all(|e| e.total == 3));
    assert_eq!(classification.last().map(|e| e.completed), Some(3));

    assert!(events
        .iter()
        .any(|e| e.phase == Phase::Tier(TierKind::PeerDependency) && e.item == "react-dom"));
    assert!(events.iter().any(|e| e.phase == Phase::Validation));
}

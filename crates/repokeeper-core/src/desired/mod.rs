//! Desired-state loader.
//!
//! Walks the tracking repository's file tree, picks out the files that
//! match the fixed layout, and maintains a fingerprint-cached, validated
//! view of the declared fleet:
//!
//! - repository manifests at `<group_dir>/<group>/<org>/<shard>/<repo>.yaml`
//! - group ownership files at `<group_dir>/<group>/OWNERS`
//! - group info documents at `<group_dir>/<group>/sig-info.yaml`
//!
//! Anything else in the tree is ignored. Each tracked file is re-fetched
//! only when its fingerprint changed; a file that fails to parse or
//! validate keeps serving its previous value (see [`cell`]).

mod cell;

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::WatchingFiles;
use crate::domain::error::{KeeperError, Result};
use crate::domain::manifest::RepoManifest;
use crate::domain::ownership::{resolve_owners, GroupInfo, GroupOwners};
use crate::platform::HostPlatform;
use cell::TrackedCell;

const OWNERS_FILE: &str = "OWNERS";
const GROUP_INFO_FILE: &str = "sig-info.yaml";

/// Desired state of one repository, with resolved ownership.
#[derive(Debug, Clone)]
pub struct DesiredRepo {
    pub manifest: Arc<RepoManifest>,
    pub group: String,
    /// Resolved plain-collaborator ids (community ids, pre-translation).
    pub owners: Vec<String>,
    /// Resolved admin ids (community ids, pre-translation).
    pub admins: Vec<String>,
}

/// The merged desired-repository set produced by one refresh.
#[derive(Debug, Clone, Default)]
pub struct DesiredSnapshot {
    pub repos: HashMap<String, DesiredRepo>,
}

impl DesiredSnapshot {
    pub fn contains(&self, name: &str) -> bool {
        self.repos.contains_key(name)
    }
}

/// Loader over the tracking repository, with per-file fingerprint cache.
pub struct DesiredStateLoader {
    watch: WatchingFiles,
    excluded_groups: Vec<String>,

    manifests: HashMap<String, TrackedCell<RepoManifest>>,
    owners: HashMap<String, TrackedCell<GroupOwners>>,
    infos: HashMap<String, TrackedCell<GroupInfo>>,

    snapshot: DesiredSnapshot,
}

impl DesiredStateLoader {
    pub fn new(watch: WatchingFiles, excluded_groups: Vec<String>) -> Self {
        Self {
            watch,
            excluded_groups,
            manifests: HashMap::new(),
            owners: HashMap::new(),
            infos: HashMap::new(),
            snapshot: DesiredSnapshot::default(),
        }
    }

    /// First load. Unlike later refreshes this is fatal on failure: a
    /// process that cannot see any desired state must not start.
    pub async fn init(&mut self, platform: &dyn HostPlatform) -> Result<DesiredSnapshot> {
        let snap = self.refresh(platform).await?;
        if snap.repos.is_empty() {
            return Err(KeeperError::Load(
                "no repository manifests found in the tracking repository".to_string(),
            ));
        }
        Ok(snap)
    }

    /// Refresh changed files and recompute the merged desired set.
    ///
    /// A tree-listing failure aborts the refresh (the cycle is skipped).
    /// A duplicate repository name across manifests is a hard validation
    /// failure for the whole load; the stale snapshot is returned.
    pub async fn refresh(&mut self, platform: &dyn HostPlatform) -> Result<DesiredSnapshot> {
        let tree = platform
            .get_directory_tree(
                &self.watch.coordinates.org,
                &self.watch.coordinates.repo,
                &self.watch.coordinates.branch,
            )
            .await?;
        if tree.is_empty() {
            return Err(KeeperError::Load("tracking repository tree is empty".to_string()));
        }

        let (manifest_files, owners_files, info_files) = self.partition_tree(
            tree.iter().map(|t| (t.path.as_str(), t.sha.as_str())),
        );

        // Drop cells whose file disappeared from the tree.
        self.manifests.retain(|p, _| manifest_files.contains_key(p));

        for (path, sha) in &manifest_files {
            let cell = self
                .manifests
                .entry(path.clone())
                .or_insert_with(|| TrackedCell::new(path));
            let w = self.watch.coordinates.clone();
            cell.refresh(
                sha,
                |p| async move { platform.get_path_content(&w.org, &w.repo, &p, &w.branch).await },
                parse_manifest,
            )
            .await;
        }

        // Merge: live cells only, declared name must match the file stem,
        // duplicate names poison the whole load.
        let mut repos: HashMap<String, (Arc<RepoManifest>, String)> = HashMap::new();
        for (path, cell) in &self.manifests {
            let Some(manifest) = cell.value() else {
                continue;
            };
            let (group, stem) = match manifest_path_parts(path, &self.watch.group_dir) {
                Some(v) => v,
                None => continue,
            };
            if manifest.name != stem {
                info!(
                    path = %path,
                    declared = %manifest.name,
                    "manifest name does not match its file name, ignoring"
                );
                continue;
            }
            if repos
                .insert(manifest.name.clone(), (manifest.clone(), group))
                .is_some()
            {
                warn!(
                    repo = %manifest.name,
                    "duplicate repository across manifests, keeping previous snapshot"
                );
                return Ok(self.snapshot.clone());
            }
        }

        // Refresh ownership documents for every referenced group.
        let mut groups: Vec<String> = repos.values().map(|(_, g)| g.clone()).collect();
        groups.sort();
        groups.dedup();
        for group in &groups {
            if self.excluded_groups.iter().any(|g| g == group) {
                continue;
            }
            self.refresh_group_docs(platform, group, &owners_files, &info_files)
                .await;
        }

        let mut snapshot = DesiredSnapshot::default();
        for (name, (manifest, group)) in repos {
            let resolution = if self.excluded_groups.iter().any(|g| g == &group) {
                Default::default()
            } else {
                resolve_owners(
                    self.owners.get(&group).and_then(|c| c.value()).as_deref(),
                    self.infos.get(&group).and_then(|c| c.value()).as_deref(),
                    &self.watch.repo_org,
                    &name,
                )
            };
            snapshot.repos.insert(
                name,
                DesiredRepo {
                    manifest,
                    group,
                    owners: resolution.owners,
                    admins: resolution.admins,
                },
            );
        }

        self.snapshot = snapshot.clone();
        Ok(snapshot)
    }

    async fn refresh_group_docs(
        &mut self,
        platform: &dyn HostPlatform,
        group: &str,
        owners_files: &HashMap<String, String>,
        info_files: &HashMap<String, String>,
    ) {
        let owners_path = format!("{}/{}/{}", self.watch.group_dir, group, OWNERS_FILE);
        match owners_files.get(&owners_path) {
            None => {
                // A deleted OWNERS file must stop being authoritative.
                self.owners.remove(group);
            }
            Some(sha) => {
                let cell = self
                    .owners
                    .entry(group.to_string())
                    .or_insert_with(|| TrackedCell::new(&owners_path));
                let w = self.watch.coordinates.clone();
                cell.refresh(
                    sha,
                    |p| async move {
                        platform.get_path_content(&w.org, &w.repo, &p, &w.branch).await
                    },
                    parse_owners,
                )
                .await;
            }
        }

        let info_path = format!("{}/{}/{}", self.watch.group_dir, group, GROUP_INFO_FILE);
        if let Some(sha) = info_files.get(&info_path) {
            let cell = self
                .infos
                .entry(group.to_string())
                .or_insert_with(|| TrackedCell::new(&info_path));
            let w = self.watch.coordinates.clone();
            cell.refresh(
                sha,
                |p| async move { platform.get_path_content(&w.org, &w.repo, &p, &w.branch).await },
                parse_group_info,
            )
            .await;
        }
    }

    /// Partition tree entries by the fixed path shapes. Returns
    /// `(manifests, owners files, info files)` as path → fingerprint.
    fn partition_tree<'a, I>(
        &self,
        entries: I,
    ) -> (
        HashMap<String, String>,
        HashMap<String, String>,
        HashMap<String, String>,
    )
    where
        I: Iterator<Item = (&'a str, &'a str)>,
    {
        let mut manifests = HashMap::new();
        let mut owners = HashMap::new();
        let mut infos = HashMap::new();

        for (path, sha) in entries {
            let parts: Vec<&str> = path.split('/').collect();
            if parts.is_empty() || parts[0] != self.watch.group_dir {
                continue;
            }
            match parts.len() {
                5 if parts[2] == self.watch.repo_org => {
                    if file_stem(parts[4]).is_some() {
                        manifests.insert(path.to_string(), sha.to_string());
                    }
                }
                3 if parts[2] == OWNERS_FILE => {
                    owners.insert(path.to_string(), sha.to_string());
                }
                3 if parts[2] == GROUP_INFO_FILE => {
                    infos.insert(path.to_string(), sha.to_string());
                }
                _ => {}
            }
        }

        (manifests, owners, infos)
    }
}

/// `(group, repo name)` from a manifest path, if it has the fixed shape.
fn manifest_path_parts(path: &str, group_dir: &str) -> Option<(String, String)> {
    let parts: Vec<&str> = path.split('/').collect();
    if parts.len() != 5 || parts[0] != group_dir {
        return None;
    }
    let stem = file_stem(parts[4])?;
    Some((parts[1].to_string(), stem.to_string()))
}

fn file_stem(file_name: &str) -> Option<&str> {
    file_name.strip_suffix(".yaml").filter(|s| !s.is_empty())
}

fn parse_manifest(content: &str) -> Result<RepoManifest> {
    let mut m: RepoManifest = serde_yaml::from_str(content)?;
    m.validate()?;
    Ok(m)
}

fn parse_owners(content: &str) -> Result<GroupOwners> {
    let mut o: GroupOwners = serde_yaml::from_str(content)?;
    o.validate()?;
    Ok(o)
}

fn parse_group_info(content: &str) -> Result<GroupInfo> {
    let mut i: GroupInfo = serde_yaml::from_str(content)?;
    i.validate()?;
    Ok(i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RepoCoordinates;

    fn loader() -> DesiredStateLoader {
        DesiredStateLoader::new(
            WatchingFiles {
                coordinates: RepoCoordinates {
                    org: "community-org".to_string(),
                    repo: "community".to_string(),
                    branch: "master".to_string(),
                },
                repo_org: "openeuler".to_string(),
                group_dir: "sig".to_string(),
            },
            vec!["sig-recycle".to_string()],
        )
    }

    #[test]
    fn test_partition_tree_shapes() {
        let l = loader();
        let entries = [
            ("sig/sig-storage/openeuler/d/disk.yaml", "s1"),
            ("sig/sig-storage/OWNERS", "s2"),
            ("sig/sig-storage/sig-info.yaml", "s3"),
            // wrong org segment
            ("sig/sig-storage/other-org/d/disk.yaml", "s4"),
            // wrong depth
            ("sig/sig-storage/openeuler/disk.yaml", "s5"),
            // not under the group dir
            ("docs/sig-storage/openeuler/d/disk.yaml", "s6"),
            // not a yaml manifest
            ("sig/sig-storage/openeuler/d/README.md", "s7"),
        ];
        let (m, o, i) = l.partition_tree(entries.iter().copied());
        assert_eq!(m.len(), 1);
        assert!(m.contains_key("sig/sig-storage/openeuler/d/disk.yaml"));
        assert_eq!(o.len(), 1);
        assert!(o.contains_key("sig/sig-storage/OWNERS"));
        assert_eq!(i.len(), 1);
        assert!(i.contains_key("sig/sig-storage/sig-info.yaml"));
    }

    #[test]
    fn test_manifest_path_parts() {
        assert_eq!(
            manifest_path_parts("sig/sig-storage/openeuler/d/disk.yaml", "sig"),
            Some(("sig-storage".to_string(), "disk".to_string()))
        );
        assert_eq!(manifest_path_parts("sig/a/b/c.yaml", "sig"), None);
        assert_eq!(
            manifest_path_parts("sig/sig-storage/openeuler/d/.yaml", "sig"),
            None
        );
    }

    #[test]
    fn test_parse_manifest_validates() {
        assert!(parse_manifest("name: disk\ntype: public").is_ok());
        assert!(parse_manifest("type: public").is_err());
        assert!(parse_manifest(":::").is_err());
    }
}

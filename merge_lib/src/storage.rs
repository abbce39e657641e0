//! Where merged output can already exist: the storage backend, queried by
//! metadata, and the local merge directory of each composition.

use crate::process::run_checked;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Metadata attribute holding the composition digest of a merged file.
pub const COMPOSITION_ATTR: &str = "composition";

/// Metadata constraints identifying merged library CRAM files.
const LIBRARY_TARGET: (&str, &str) = ("target", "library");
const CRAM_TYPE: (&str, &str) = ("type", "cram");

/// Directory under a merge directory holding its status markers.
const STATUS_DIR: &str = "status";
/// Written once the merge itself finished.
pub const MERGE_COMPLETED_MARKER: &str = "merge_completed";
/// Present while merged output is being loaded to storage.
pub const LOADING_MARKER: &str = "loading_to_irods";

/// The metadata query that finds the merged CRAM of a composition.
pub fn merged_output_query(digest: &str) -> [(&str, &str); 3] {
    [(COMPOSITION_ATTR, digest), LIBRARY_TARGET, CRAM_TYPE]
}

/// Object-find primitive of the storage backend.
pub trait ObjectStore {
    /// Count data objects under `root` that carry every given
    /// attribute/value pair.
    fn count_objects(&self, root: &str, metadata: &[(&str, &str)]) -> Result<usize>;
}

/// iRODS metadata queries through `imeta qu`.
pub struct ImetaStore {
    zone: Option<String>,
}

impl ImetaStore {
    pub fn new(zone: Option<String>) -> Self {
        ImetaStore { zone }
    }
}

impl ObjectStore for ImetaStore {
    fn count_objects(&self, root: &str, metadata: &[(&str, &str)]) -> Result<usize> {
        let mut cmd = Command::new("imeta");
        cmd.arg("qu");
        if let Some(zone) = &self.zone {
            cmd.arg("-z").arg(zone);
        }
        cmd.arg("-d");
        for (i, (attr, value)) in metadata.iter().enumerate() {
            if i > 0 {
                cmd.arg("and");
            }
            cmd.arg(attr).arg("=").arg(value);
        }
        Ok(count_objects_under(&run_checked(&mut cmd)?, root))
    }
}

/// Count the `dataObj:` entries of an `imeta qu` result whose collection
/// lies under `root`.
fn count_objects_under(imeta_output: &str, root: &str) -> usize {
    let root = root.trim_end_matches('/');
    let mut collection: Option<&str> = None;
    let mut count = 0;
    for line in imeta_output.lines().map(str::trim) {
        if let Some(c) = line.strip_prefix("collection:") {
            collection = Some(c.trim());
        } else if line.starts_with("dataObj:") {
            let under_root = collection.is_some_and(|c| {
                c == root || c.strip_prefix(root).is_some_and(|rest| rest.starts_with('/'))
            });
            if under_root {
                count += 1;
            }
        }
    }
    count
}

/// Local merge directories, one per composition digest, each with a
/// `status` directory of marker files.
#[derive(Debug, Clone)]
pub struct MergeDirs {
    root: PathBuf,
}

impl MergeDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MergeDirs { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn merge_dir(&self, digest: &str) -> PathBuf {
        self.root.join(digest)
    }

    fn marker(&self, digest: &str, name: &str) -> PathBuf {
        self.merge_dir(digest).join(STATUS_DIR).join(name)
    }

    pub fn is_merge_completed(&self, digest: &str) -> bool {
        self.marker(digest, MERGE_COMPLETED_MARKER).exists()
    }

    pub fn is_loading(&self, digest: &str) -> bool {
        self.marker(digest, LOADING_MARKER).exists()
    }
}

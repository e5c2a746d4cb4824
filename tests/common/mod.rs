#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }
}

/// A small semicolon-separated raw extract with the dataset's usual quirks:
/// decimal commas, an unpadded department, a masked case count, the
/// aggregate department 999, an out-of-range year, and an empty row.
pub const RAW_EXTRACT: &str = "\
Année;region;dept;sexe;patho_niv1;cla_age_5;Ntop;Npop;prev
2023;84;99;1;Diabète;0-4;120;1000;12,0
2023;84;99;2;Diabète;0-4;80;1000;8,0
2023;84;99;1;Cancer;0-4;NA;999;5,5
2023;11;75;1;Diabète;5-9;300;2000;15,0
2023;99;999;9;Diabète;0-4;5000;70000;7,1
1999;84;99;1;Diabète;0-4;1;1000;0,1
;;;;;;;;
";

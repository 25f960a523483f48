mod builder;

pub use builder::*;

use std::{
    fs::File,
    io::{BufReader, ErrorKind},
    path::{Path, PathBuf},
};

use serde::Deserialize;
use serde_json::de::from_reader;
use walkdir::WalkDir;

/// Directory with real model files, each optionally accompanied by a `.json` spec.
pub const TEST_DATA_ENV: &str = "HLSTUDIO_TEST_DATA";

/// Returns the directory named by [`TEST_DATA_ENV`], if set.
pub fn test_data_dir() -> Option<PathBuf> {
    std::env::var_os(TEST_DATA_ENV).map(PathBuf::from)
}

pub trait FileSpec
where
    for<'de> Self: Deserialize<'de>,
{
    type Type;

    fn extension() -> &'static str;

    fn read(file: File) -> Self::Type;

    fn verify(&self, data: Self::Type);

    fn verify_from_path(path: &Path) {
        let files = discover_test_files(path, Self::extension());

        for file in files {
            let spec_path = file.path.with_extension("json");

            let spec_file = match File::open(spec_path) {
                Ok(f) => f,
                Err(e) => {
                    if e.kind() == ErrorKind::NotFound {
                        continue;
                    }
                    Err(e).unwrap()
                }
            };

            eprintln!("Verifying against {}", file.name);

            let data = Self::read(File::open(&file.path).unwrap());
            let spec: Self = from_reader(BufReader::new(spec_file)).unwrap();

            spec.verify(data);
        }
    }
}

struct TestFile {
    name: String,
    path: PathBuf,
}

fn discover_test_files(path: &Path, extension: &str) -> Vec<TestFile> {
    let mut files = Vec::new();

    for result in WalkDir::new(path) {
        let entry = result.unwrap();

        if !entry.file_type().is_file() {
            continue;
        }

        let file_name = entry.path().strip_prefix(path).unwrap();
        let name_with_ext = file_name.to_string_lossy();
        let Some(name) = name_with_ext.strip_suffix(extension) else {
            continue;
        };

        files.push(TestFile {
            name: name.to_owned(),
            path: entry.into_path(),
        });
    }

    files
}

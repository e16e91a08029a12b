use std::{fs::File, io::ErrorKind, path::Path};

use serde::{Deserialize, Serialize};

use crate::{error::Error, persist::write_atomic};

/// Per-repository settings, stored as pretty JSON in `<repo>/config`.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub user: User,
    #[serde(default = "default_branch")]
    pub default_branch: String,
}

/// The identity recorded as author and committer.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
}

fn default_branch() -> String {
    String::from("master")
}

impl Default for Config {
    fn default() -> Self {
        let name = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| String::from("unknown"));
        let email = format!("{}@example.com", name);
        Config {
            user: User { name, email },
            default_branch: default_branch(),
        }
    }
}

impl User {
    /// The `Name <email>` form written into commits.
    pub fn identity(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }
}

impl Config {
    /// Loads the configuration, falling back to defaults if the file is missing.
    pub fn load(path: &Path) -> Result<Self, Error> {
        match File::open(path) {
            Ok(file) => Ok(serde_json::from_reader(file)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Config::default()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), Error> {
        write_atomic(path, &serde_json::to_vec_pretty(self)?)?;
        Ok(())
    }
}

#[test]
fn test_config_round_trip() {
    let tempdir = tempfile::tempdir().unwrap();
    let path = tempdir.path().join("config");
    let config = Config {
        user: User {
            name: String::from("alice"),
            email: String::from("alice@example.org"),
        },
        default_branch: String::from("main"),
    };
    config.save(&path).unwrap();
    assert_eq!(Config::load(&path).unwrap(), config);
    assert_eq!(config.user.identity(), "alice <alice@example.org>");
}

#[test]
fn test_config_defaults() {
    let tempdir = tempfile::tempdir().unwrap();
    let config = Config::load(&tempdir.path().join("missing")).unwrap();
    assert_eq!(config.default_branch, "master");
    assert!(config.user.email.ends_with("@example.com"));

    let path = tempdir.path().join("config");
    std::fs::write(&path, r#"{ "user": { "name": "bob", "email": "bob@b" } }"#).unwrap();
    assert_eq!(Config::load(&path).unwrap().default_branch, "master");

    std::fs::write(&path, "{").unwrap();
    assert!(matches!(Config::load(&path), Err(Error::Serde(_))));
}

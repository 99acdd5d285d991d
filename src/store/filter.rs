//! `field=regex` filters for listing installations

use std::str::FromStr;

use regex::Regex;

use super::Installation;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Tag,
    Repo,
    Path,
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(Field::Name),
            "tag" => Ok(Field::Tag),
            "repo" => Ok(Field::Repo),
            "path" => Ok(Field::Path),
            other => Err(Error::InvalidFilter(format!(
                "unknown field {other:?}, expected name, tag, repo or path"
            ))),
        }
    }
}

/// Keeps installations whose `field` matches `pattern`
#[derive(Debug, Clone)]
pub struct Filter {
    field: Field,
    pattern: Regex,
}

impl Filter {
    pub fn matches(&self, inst: &Installation) -> bool {
        match self.field {
            Field::Name => self.pattern.is_match(&inst.name),
            Field::Tag => self.pattern.is_match(&inst.tag),
            Field::Repo => self.pattern.is_match(&inst.repo),
            Field::Path => self.pattern.is_match(&inst.install_path.to_string_lossy()),
        }
    }
}

impl FromStr for Filter {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (field, pattern) = s
            .split_once('=')
            .ok_or_else(|| Error::InvalidFilter(format!("{s:?} is not of the form field=regex")))?;
        let pattern =
            Regex::new(pattern).map_err(|e| Error::InvalidFilter(format!("bad pattern: {e}")))?;
        Ok(Self {
            field: field.parse()?,
            pattern,
        })
    }
}

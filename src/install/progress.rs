//! Pipeline stage names used for logging and error context

use std::fmt;

/// Stage of an install run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Discovering, // Fetching release metadata from GitHub
    Preparing,   // Creating the workspace
    Downloading, // Streaming the asset into the workspace
    Unpacking,   // Extracting and locating the executable
    Installing,  // Copying into the bin directory
    Saving,      // Recording the installation
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Discovering => "fetch release",
            Phase::Preparing => "prepare workspace",
            Phase::Downloading => "download",
            Phase::Unpacking => "unpack",
            Phase::Installing => "install",
            Phase::Saving => "save installation",
        })
    }
}

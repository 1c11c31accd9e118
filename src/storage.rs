//! # Summary
//!
//! This module dumps replica state to disk for offline inspection. Nothing
//! is ever read back by a running replica: a restarted replica starts from
//! an empty log.
//!
//! Currently uses `bincode` to serialize state to the filesystem. This is a
//! naive implementation that clears the file on every write and re-serializes
//! data from scratch.

use std::fs;
use std::io::{Seek, SeekFrom};
use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::message::PValue;
use crate::round::ProposalNumber;

/// Learned log of a single replica at some point in time.
#[derive(Serialize, Deserialize)]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub id: usize,
    pub leader_proposal: ProposalNumber,
    pub first_unchosen: usize,

    /// Learned decrees in slot order
    pub learned: Vec<PValue>,

    /// Learned slots repeating a request chosen lower down
    pub duplicates: Vec<usize>,
}

/// Single-file dump target.
pub struct Storage<S> {
    file: fs::File,
    _marker: PhantomData<S>,
}

impl<S> Storage<S> {
    /// Opens or creates the file at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Storage {
            file,
            _marker: PhantomData,
        })
    }
}

impl<S: DeserializeOwned> Storage<S> {
    /// Reads back the last saved state, or `None` if nothing was written yet.
    pub fn load(&mut self) -> Result<Option<S>, Error> {
        if self.file.metadata()?.len() == 0 {
            return Ok(None)
        }
        self.file.seek(SeekFrom::Start(0))?;
        Ok(Some(bincode::deserialize_from(&self.file)?))
    }
}

impl<S: Serialize> Storage<S> {
    /// Replaces the file contents with `state`.
    pub fn save(&mut self, state: &S) -> Result<(), Error> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        bincode::serialize_into(&mut self.file, state)?;
        Ok(())
    }
}

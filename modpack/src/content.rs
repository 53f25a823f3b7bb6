//! Level metadata and playlist documents edited during a merge.
//!
//! Both documents are stored as single records inside the game archives:
//! `LevelTypes` in the Init archive and `LevelSetTypes` in the Game
//! archive. They are only interpreted as far as merging requires, every
//! other part of the text is preserved.

use crate::xml::{Document, Element, XmlError};
use log::{debug, warn};
use std::fmt;
use thiserror::Error;

/// Name of the level metadata record inside the Init archive.
pub const LEVEL_TYPES: &str = "LevelTypes";

/// Name of the playlist record inside the Game archive.
pub const LEVEL_SET_TYPES: &str = "LevelSetTypes";

const LEVEL_TYPE: &str = "LevelType";
const LEVEL_NAME: &str = "LevelName";
const LEVEL_SET_TYPE: &str = "LevelSetType";
const LEVEL_SET_NAME: &str = "LevelSetName";
const MEMBERS: &str = "LevelTypes";

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("malformed xml: {0}")]
    Xml(#[from] XmlError),
    #[error("expected <{expected}> element, found <{found}>")]
    UnexpectedRoot { expected: &'static str, found: String },
    #[error("<{element}> is missing the {attribute} attribute")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },
}

fn parse_root(text: &str, expected: &'static str) -> Result<Document, DocumentError> {
    let document = Document::parse(text)?;
    let found = document.root()?.name();
    if found != expected {
        return Err(DocumentError::UnexpectedRoot {
            expected,
            found: found.to_owned(),
        });
    }
    Ok(document)
}

fn parse_element(text: &str, expected: &'static str) -> Result<Element, DocumentError> {
    Ok(parse_root(text, expected)?.into_root()?)
}

/// The `<LevelTypes>` document holding metadata of every level.
#[derive(Clone, Debug)]
pub struct LevelTypes(Document);

impl LevelTypes {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        parse_root(text, LEVEL_TYPES).map(LevelTypes)
    }

    /// Inserts a `<LevelType>` element, replacing the existing element with
    /// the same `LevelName` in place when there is one.
    pub fn upsert(&mut self, level_type: &str) -> Result<(), DocumentError> {
        let element = parse_element(level_type, LEVEL_TYPE)?;
        let name = element
            .attribute(LEVEL_NAME)
            .ok_or(DocumentError::MissingAttribute {
                element: LEVEL_TYPE,
                attribute: LEVEL_NAME,
            })?
            .to_owned();

        let root = self.0.root_mut()?;
        let existing = root
            .elements_mut(LEVEL_TYPE)
            .find(|e| e.attribute(LEVEL_NAME) == Some(name.as_str()));
        match existing {
            Some(existing) => {
                debug!("replacing level type {:?}", name);
                *existing = element;
            }
            None => {
                debug!("adding level type {:?}", name);
                root.append_element(element);
            }
        }
        Ok(())
    }
}

impl fmt::Display for LevelTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// The `<LevelSetTypes>` document holding every playlist. Each
/// `<LevelSetType>` lists its member levels as comma separated names in a
/// nested `<LevelTypes>` element.
#[derive(Clone, Debug)]
pub struct LevelSetTypes(Document);

impl LevelSetTypes {
    pub fn parse(text: &str) -> Result<Self, DocumentError> {
        parse_root(text, LEVEL_SET_TYPES).map(LevelSetTypes)
    }

    /// Appends a `<LevelSetType>` element. Existing playlists with the same
    /// name are left alone, so this can introduce duplicates.
    pub fn append(&mut self, level_set_type: &str) -> Result<(), DocumentError> {
        let element = parse_element(level_set_type, LEVEL_SET_TYPE)?;
        debug!(
            "adding playlist {:?}",
            element.attribute(LEVEL_SET_NAME).unwrap_or_default()
        );
        self.0.root_mut()?.append_element(element);
        Ok(())
    }

    /// Adds `level_name` to every playlist (duplicates included) whose name
    /// is listed in `playlists`.
    ///
    /// A playlist is considered to already contain the level when its own
    /// name occurs inside `level_name`; the member list itself is not
    /// consulted.
    pub fn link(&mut self, level_name: &str, playlists: &[String]) -> Result<(), DocumentError> {
        let root = self.0.root_mut()?;

        for playlist in root.elements_mut(LEVEL_SET_TYPE) {
            let name = match playlist.attribute(LEVEL_SET_NAME) {
                Some(name) => name.to_owned(),
                None => continue,
            };

            if !playlists.iter().any(|p| *p == name) {
                continue;
            }

            if level_name.contains(name.as_str()) {
                warn!(
                    "not linking {:?} into {:?}: treated as already present",
                    level_name, name
                );
                continue;
            }

            let mut members = read_members(playlist)?;
            members.push(level_name.to_owned());
            write_members(playlist, &members);
            debug!("linked {:?} into playlist {:?}", level_name, name);
        }

        Ok(())
    }
}

impl fmt::Display for LevelSetTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

fn read_members(playlist: &Element) -> Result<Vec<String>, DocumentError> {
    match playlist.elements(MEMBERS).next() {
        Some(list) => Ok(list
            .text()?
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
            .collect()),
        None => Ok(vec![]),
    }
}

fn write_members(playlist: &mut Element, members: &[String]) {
    let joined = members.join(",");
    let existing = playlist.elements_mut(MEMBERS).next();
    match existing {
        Some(list) => list.set_text(&joined),
        None => {
            let mut list = Element::new(MEMBERS);
            list.set_text(&joined);
            playlist.append_element(list);
        }
    }
}

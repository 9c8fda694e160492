//! Rapified (binary) config reader.
//!
//! Reads the `\0raP` binary class-tree format used for compiled mission
//! and addon configs, and writes a read class back out as the textual
//! `class Name { ... }` grammar. Parsing the textual grammar itself is
//! out of scope — only round-tripping what was read is supported.

mod error;

pub use error::{Error, Result};

use rv_binio::ReadExt;
use std::fmt::Write as _;
use std::io::{Read, Seek, SeekFrom};

const SIGNATURE: &[u8; 4] = b"\0raP";

/// A single array element; arrays may nest one level of sub-arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrayElement {
    String(String),
    Float(f32),
    Int(i32),
    Nested(Array),
}

/// An array value, optionally an expansion (`name[] += {...}`) of an
/// inherited array rather than a full replacement.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Array {
    pub expansion: bool,
    pub elements: Vec<ArrayElement>,
}

/// A single class member: a nested class, a scalar variable, or an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Class(Box<Class>),
    /// Forward declaration (`class Name;`) with no body of its own.
    ExternalClass,
    /// `delete Name;` — a tombstone recorded for config merging.
    DeletedClass,
    String(String),
    Float(f32),
    Int(i32),
    Array(Array),
}

/// A config class: an optional parent name and an ordered list of
/// named entries (order matters — later entries may redefine earlier
/// ones during merging, and text output preserves read order).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Class {
    pub parent: String,
    pub entries: Vec<(String, Entry)>,
}

impl Class {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.entries.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, e)| e)
    }

    /// Renders this class's entries (not including its own header) as
    /// the textual config grammar, recursing into nested classes.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        write_class(&mut out, self, 0);
        out
    }
}

fn escape_string(s: &str) -> String {
    s.replace('"', "\"\"")
}

fn format_float(f: f32) -> String {
    let mut s = format!("{f}");
    if !s.contains('.') && !s.contains('e') && !s.contains("inf") && !s.contains("NaN") {
        s.push_str(".0");
    }
    s
}

fn write_array_elements(out: &mut String, elements: &[ArrayElement]) {
    out.push('{');
    for (i, el) in elements.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        match el {
            ArrayElement::String(s) => {
                let _ = write!(out, "\"{}\"", escape_string(s));
            }
            ArrayElement::Float(f) => out.push_str(&format_float(*f)),
            ArrayElement::Int(n) => {
                let _ = write!(out, "{n}");
            }
            ArrayElement::Nested(arr) => write_array_elements(out, &arr.elements),
        }
    }
    out.push('}');
}

fn write_class(out: &mut String, cls: &Class, level: usize) {
    let indent: String = "\t".repeat(level);
    for (name, entry) in &cls.entries {
        match entry {
            Entry::Class(c) => {
                let parent_str = if c.parent.is_empty() { String::new() } else { format!(": {}", c.parent) };
                if c.entries.is_empty() {
                    let _ = writeln!(out, "{indent}class {name}{parent_str} {{}};");
                } else {
                    let _ = writeln!(out, "{indent}class {name}{parent_str} {{");
                    write_class(out, c, level + 1);
                    let _ = writeln!(out, "{indent}}};");
                }
            }
            Entry::ExternalClass => {
                let _ = writeln!(out, "{indent}class {name};");
            }
            Entry::DeletedClass => {
                let _ = writeln!(out, "{indent}delete {name};");
            }
            Entry::String(s) => {
                let _ = writeln!(out, "{indent}{name} = \"{}\";", escape_string(s));
            }
            Entry::Float(f) => {
                let _ = writeln!(out, "{indent}{name} = {};", format_float(*f));
            }
            Entry::Int(n) => {
                let _ = writeln!(out, "{indent}{name} = {n};");
            }
            Entry::Array(arr) => {
                let op = if arr.expansion { "+=" } else { "=" };
                let _ = write!(out, "{indent}{name}[] {op} ");
                write_array_elements(out, &arr.elements);
                out.push_str(";\n");
            }
        }
    }
}

fn read_array<R: Read>(r: &mut R) -> Result<Array> {
    let num_elements = r.read_compressed_int()?;
    let mut elements = Vec::with_capacity(num_elements as usize);
    for _ in 0..num_elements {
        let elem_type = r.read_u8()?;
        let el = match elem_type {
            0 => ArrayElement::String(r.read_cstring()?),
            1 => ArrayElement::Float(r.read_f32()?),
            2 => ArrayElement::Int(r.read_i32()?),
            3 => ArrayElement::Nested(read_array(r)?),
            other => return Err(Error::UnknownArrayElementType(other)),
        };
        elements.push(el);
    }
    Ok(Array { expansion: false, elements })
}

fn read_class_body<R: Read>(r: &mut R) -> Result<Class> {
    let parent = r.read_cstring()?;
    let num_entries = r.read_compressed_int()?;

    let mut cls = Class { parent, entries: Vec::with_capacity(num_entries as usize) };
    for _ in 0..num_entries {
        let entry_type = r.read_u8()?;
        match entry_type {
            0 => {
                let name = r.read_cstring()?;
                let child = read_class_at_offset(r)?;
                cls.entries.push((name, Entry::Class(Box::new(child))));
            }
            1 => {
                let subtype = r.read_u8()?;
                let name = r.read_cstring()?;
                let entry = match subtype {
                    0 => Entry::String(r.read_cstring()?),
                    1 => Entry::Float(r.read_f32()?),
                    2 => Entry::Int(r.read_i32()?),
                    other => return Err(Error::UnknownVariableSubtype(other)),
                };
                cls.entries.push((name, entry));
            }
            2 => {
                let name = r.read_cstring()?;
                let arr = read_array(r)?;
                cls.entries.push((name, Entry::Array(arr)));
            }
            3 => {
                let name = r.read_cstring()?;
                cls.entries.push((name, Entry::ExternalClass));
            }
            4 => {
                let name = r.read_cstring()?;
                cls.entries.push((name, Entry::DeletedClass));
            }
            5 => {
                r.read_u32()?; // unused offset slot for expansions
                let name = r.read_cstring()?;
                let mut arr = read_array(r)?;
                arr.expansion = true;
                cls.entries.push((name, Entry::Array(arr)));
            }
            other => return Err(Error::UnknownEntryType(other)),
        }
    }
    Ok(cls)
}

/// A nested class body lives at an absolute offset; the directory entry
/// only carries that offset, so this seeks there, reads the body, and
/// restores the caller's stream position before returning.
fn read_class_at_offset<R: Read + Seek>(r: &mut R) -> Result<Class> {
    let offset = r.read_u32()?;
    let saved = r.stream_position().map_err(rv_binio::Error::Io)?;
    r.seek(SeekFrom::Start(u64::from(offset))).map_err(rv_binio::Error::Io)?;
    let result = read_class_body(r);
    r.seek(SeekFrom::Start(saved)).map_err(rv_binio::Error::Io)?;
    result
}

/// Validates the `\0raP` signature, seeks to the root class body at
/// offset 16, and reads the full class tree.
pub fn read<R: Read + Seek>(r: &mut R) -> Result<Class> {
    let sig = r.read_signature()?;
    if &sig != SIGNATURE {
        return Err(Error::BadSignature(sig));
    }
    r.seek(SeekFrom::Start(16)).map_err(rv_binio::Error::Io)?;
    read_class_body(r)
}

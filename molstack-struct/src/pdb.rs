//! PDB format reader.
//!
//! Reads ATOM and HETATM records into an [`AtomArrayStack`]. MODEL/ENDMDL
//! records delimit models (NMR ensembles, trajectory snapshots); a file
//! without MODEL records is a single model. Every model must list the same
//! atoms in the same order.

use std::path::Path;

use molstack_core::{MolError, Result};

use crate::types::{Atom, AtomArrayStack, Point3D};

#[derive(Default)]
struct Model {
    atoms: Vec<Atom>,
    coords: Vec<Point3D>,
}

/// Parse PDB-format text.
///
/// # Errors
///
/// Returns an error if no ATOM/HETATM records are found, a record is
/// malformed, or models differ in their atoms.
pub fn parse_pdb(input: &str) -> Result<AtomArrayStack> {
    let mut models: Vec<Model> = Vec::new();
    let mut current: Option<Model> = None;
    let mut inferred_elements = 0usize;

    for (i, line) in input.lines().enumerate() {
        let line_no = i + 1;
        if line.starts_with("MODEL") {
            if let Some(model) = current.take() {
                models.push(model);
            }
            current = Some(Model::default());
        } else if line.starts_with("ENDMDL") {
            if let Some(model) = current.take() {
                models.push(model);
            }
        } else if line.starts_with("ATOM  ") || line.starts_with("HETATM") {
            let (atom, coord, inferred) = parse_atom_record(line, line_no)?;
            if inferred {
                inferred_elements += 1;
            }
            let model = current.get_or_insert_with(Model::default);
            model.atoms.push(atom);
            model.coords.push(coord);
        }
    }
    if let Some(model) = current.take() {
        models.push(model);
    }
    models.retain(|m| !m.atoms.is_empty());

    if inferred_elements > 0 {
        log::warn!(
            "{} atom record(s) lack an element symbol; inferred from atom names",
            inferred_elements
        );
    }

    let mut iter = models.into_iter();
    let first = iter
        .next()
        .ok_or_else(|| MolError::Parse("no ATOM records found".into()))?;
    let atoms = first.atoms;
    let mut frames = vec![first.coords];

    for (m, model) in iter.enumerate() {
        if model.atoms != atoms {
            return Err(MolError::Parse(format!(
                "model {} does not contain the same atoms as model 1",
                m + 2
            )));
        }
        frames.push(model.coords);
    }

    log::debug!(
        "parsed {} model(s) of {} atom(s) from PDB",
        frames.len(),
        atoms.len()
    );
    AtomArrayStack::new(atoms, frames)
}

/// Parse a PDB file from disk.
pub fn parse_pdb_file(path: impl AsRef<Path>) -> Result<AtomArrayStack> {
    let contents = std::fs::read_to_string(path)?;
    parse_pdb(&contents)
}

/// Annotation and coordinate of one record; the flag is set when the
/// element was inferred from the atom name.
fn parse_atom_record(line: &str, line_no: usize) -> Result<(Atom, Point3D, bool)> {
    // Coordinates end at column 54
    if line.len() < 54 {
        return Err(MolError::parse_at(
            line_no,
            format!("ATOM record too short ({} chars)", line.len()),
        ));
    }

    let name = safe_slice(line, 12, 16).trim();
    let res_name = safe_slice(line, 17, 20).trim();
    let chain_id = safe_slice(line, 21, 22).trim();
    let res_id = safe_slice(line, 22, 26)
        .trim()
        .parse::<i32>()
        .map_err(|e| MolError::parse_at(line_no, format!("bad residue seq number: {}", e)))?;

    let x = parse_coord(line, 30, 38, "x", line_no)?;
    let y = parse_coord(line, 38, 46, "y", line_no)?;
    let z = parse_coord(line, 46, 54, "z", line_no)?;

    let (element, inferred) = match safe_slice(line, 76, 78).trim() {
        "" => (infer_element(name), true),
        e => (e.to_string(), false),
    };

    let mut atom = Atom::new(chain_id, res_id, res_name, name, &element);
    atom.hetero = line.starts_with("HETATM");
    Ok((atom, Point3D::new(x, y, z), inferred))
}

fn parse_coord(line: &str, start: usize, end: usize, axis: &str, line_no: usize) -> Result<f64> {
    safe_slice(line, start, end)
        .trim()
        .parse::<f64>()
        .map_err(|e| MolError::parse_at(line_no, format!("bad {} coordinate: {}", axis, e)))
}

/// First alphabetic character of the atom name (`" CA "` -> `C`, `"1HB "` -> `H`).
fn infer_element(name: &str) -> String {
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_string())
        .unwrap_or_default()
}

/// Substring that tolerates short lines.
fn safe_slice(s: &str, start: usize, end: usize) -> &str {
    let len = s.len();
    if start >= len {
        return "";
    }
    s.get(start..end.min(len)).unwrap_or("")
}

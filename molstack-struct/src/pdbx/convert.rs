//! Conversion between the `atom_site` category and [`AtomArrayStack`].
//!
//! Rows are grouped into models by `pdbx_PDB_model_num` (all rows belong to
//! model 1 when the column is absent). Annotations come from the first
//! model; later models only contribute coordinates.

use indexmap::IndexMap;
use molstack_core::{MolError, Result};

use super::file::{Category, PdbxFile};
use crate::types::{Atom, AtomArrayStack, Point3D};

const ATOM_SITE: &str = "atom_site";

/// Build an atom stack from the `atom_site` category of `block` (default:
/// first block).
///
/// # Errors
///
/// Returns an error if the category is missing, a required column is
/// missing, a value cannot be parsed, or models differ in their atoms.
pub fn get_structure(file: &PdbxFile, block: Option<&str>) -> Result<AtomArrayStack> {
    let columns = file.get_category(ATOM_SITE, block)?.into_looped();
    let n_rows = columns.values().next().map_or(0, Vec::len);
    if n_rows == 0 {
        return Err(MolError::Parse("atom_site category has no rows".into()));
    }

    // Rows per model, in order of first appearance
    let mut models: IndexMap<i32, Vec<usize>> = IndexMap::new();
    for row in 0..n_rows {
        let model = match get_field_opt(&columns, &["pdbx_PDB_model_num"], row) {
            Some(_) => get_field_i32(&columns, &["pdbx_PDB_model_num"], row)?,
            None => 1,
        };
        models.entry(model).or_default().push(row);
    }

    let mut groups = models.into_iter();
    let Some((first_model, first_rows)) = groups.next() else {
        return Err(MolError::Parse("atom_site category has no rows".into()));
    };

    let atoms = first_rows
        .iter()
        .map(|&row| atom_from_row(&columns, row))
        .collect::<Result<Vec<_>>>()?;
    let mut frames = vec![coords_from_rows(&columns, &first_rows)?];

    for (model, rows) in groups {
        if rows.len() != atoms.len() {
            return Err(MolError::Parse(format!(
                "model {} has {} atoms, model {} has {}",
                model,
                rows.len(),
                first_model,
                atoms.len()
            )));
        }
        for (i, &row) in rows.iter().enumerate() {
            if atom_from_row(&columns, row)? != atoms[i] {
                return Err(MolError::Parse(format!(
                    "atom {} of model {} does not match model {}",
                    i + 1,
                    model,
                    first_model
                )));
            }
        }
        frames.push(coords_from_rows(&columns, &rows)?);
    }

    log::debug!(
        "read {} model(s) of {} atom(s) from atom_site",
        frames.len(),
        atoms.len()
    );
    AtomArrayStack::new(atoms, frames)
}

/// Write `stack` as the `atom_site` category of `block`, one row per atom
/// per model. Replaces an existing `atom_site` category.
pub fn set_structure(file: &mut PdbxFile, stack: &AtomArrayStack, block: &str) -> Result<()> {
    const KEYS: [&str; 14] = [
        "group_PDB",
        "id",
        "type_symbol",
        "label_atom_id",
        "label_comp_id",
        "label_asym_id",
        "label_seq_id",
        "Cartn_x",
        "Cartn_y",
        "Cartn_z",
        "auth_seq_id",
        "auth_comp_id",
        "auth_asym_id",
        "pdbx_PDB_model_num",
    ];
    let n_rows = stack.stack_depth() * stack.array_length();
    let mut columns: IndexMap<String, Vec<String>> = KEYS
        .iter()
        .map(|k| (k.to_string(), Vec::with_capacity(n_rows)))
        .collect();

    let mut serial = 0usize;
    for (m, frame) in stack.frames().iter().enumerate() {
        for (atom, p) in stack.atoms().iter().zip(frame) {
            serial += 1;
            let group = if atom.hetero { "HETATM" } else { "ATOM" };
            let values = [
                group.to_string(),
                serial.to_string(),
                atom.element.clone(),
                atom.name.clone(),
                atom.res_name.clone(),
                atom.chain_id.clone(),
                atom.res_id.to_string(),
                format!("{:.3}", p.x),
                format!("{:.3}", p.y),
                format!("{:.3}", p.z),
                atom.res_id.to_string(),
                atom.res_name.clone(),
                atom.chain_id.clone(),
                (m + 1).to_string(),
            ];
            for ((_, column), value) in columns.iter_mut().zip(values) {
                column.push(value);
            }
        }
    }

    file.set_category(ATOM_SITE, Category::Looped(columns), Some(block), true)
}

fn atom_from_row(columns: &IndexMap<String, Vec<String>>, row: usize) -> Result<Atom> {
    let element = get_field_str(columns, &["type_symbol"], row)?;
    let name = get_field_str(columns, &["label_atom_id", "auth_atom_id"], row)?;
    let res_name = get_field_str(columns, &["label_comp_id", "auth_comp_id"], row)?;
    let chain_id = get_field_str(columns, &["auth_asym_id", "label_asym_id"], row)?;
    let res_id = get_field_i32(columns, &["auth_seq_id", "label_seq_id"], row)?;

    let mut atom = Atom::new(chain_id, res_id, res_name, name, element);
    atom.hetero = get_field_opt(columns, &["group_PDB"], row) == Some("HETATM");
    Ok(atom)
}

fn coords_from_rows(columns: &IndexMap<String, Vec<String>>, rows: &[usize]) -> Result<Vec<Point3D>> {
    rows.iter()
        .map(|&row| {
            Ok(Point3D::new(
                get_field_f64(columns, &["Cartn_x"], row)?,
                get_field_f64(columns, &["Cartn_y"], row)?,
                get_field_f64(columns, &["Cartn_z"], row)?,
            ))
        })
        .collect()
}

// ---- Field extraction helpers ----

/// First present value among `fields`; `.` and `?` count as absent.
fn get_field_opt<'a>(
    columns: &'a IndexMap<String, Vec<String>>,
    fields: &[&str],
    row: usize,
) -> Option<&'a str> {
    fields.iter().find_map(|field| {
        columns
            .get(*field)
            .and_then(|column| column.get(row))
            .map(String::as_str)
            .filter(|s| *s != "." && *s != "?")
    })
}

fn get_field_str<'a>(
    columns: &'a IndexMap<String, Vec<String>>,
    fields: &[&str],
    row: usize,
) -> Result<&'a str> {
    get_field_opt(columns, fields, row).ok_or_else(|| {
        MolError::Parse(format!(
            "missing field {} in atom_site row {}",
            fields.join("/"),
            row
        ))
    })
}

fn get_field_i32(columns: &IndexMap<String, Vec<String>>, fields: &[&str], row: usize) -> Result<i32> {
    let s = get_field_str(columns, fields, row)?;
    s.parse::<i32>().map_err(|e| {
        MolError::Parse(format!(
            "bad {} value '{}' in row {}: {}",
            fields[0], s, row, e
        ))
    })
}

fn get_field_f64(columns: &IndexMap<String, Vec<String>>, fields: &[&str], row: usize) -> Result<f64> {
    let s = get_field_str(columns, fields, row)?;
    s.parse::<f64>().map_err(|e| {
        MolError::Parse(format!(
            "bad {} value '{}' in row {}: {}",
            fields[0], s, row, e
        ))
    })
}

use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::info;
use crate::compiler::CompiledUnit;
use crate::error::CompilerError;

/// Line of a template replaced by the compiled body.
pub const MARKER: &str = "// USER CODE HERE //";

pub const DEFAULT_TEMPLATE: &str = r#"import { assign, current_scope, WHEN_BLOCK_MANAGER } from "./helper";

// USER CODE HERE //
"#;

const DEFAULT_EXTENSION: &str = "tsx";

/// Put a compiled body where the marker stands. Only the first marker is replaced.
pub fn wrap(template: &str, body: &str) -> Result<String, CompilerError> {
    if !template.contains(MARKER) {
        return Err(CompilerError::Template(format!(
            "template is missing the `{MARKER}` marker"
        )));
    }
    Ok(template.replacen(MARKER, body.trim_end_matches('\n'), 1))
}

pub fn load_template(path: Option<&Path>) -> Result<String, CompilerError> {
    match path {
        None => Ok(DEFAULT_TEMPLATE.to_string()),
        Some(path) if !path.is_file() => Err(CompilerError::FileNotFound(format!(
            "Template not found: {}",
            path.display()
        ))),
        Some(path) => Ok(fs::read_to_string(path)?),
    }
}

/// Named units keep their name; unnamed ones are numbered in order of appearance.
pub fn file_names(units: &[CompiledUnit]) -> Vec<String> {
    let mut unnamed = 0;
    units
        .iter()
        .map(|unit| match &unit.name {
            Some(name) if Path::new(name).extension().is_some() => name.clone(),
            Some(name) => format!("{name}.{DEFAULT_EXTENSION}"),
            None => {
                let name = format!("{unnamed}.{DEFAULT_EXTENSION}");
                unnamed += 1;
                name
            }
        })
        .collect()
}

/// A unit name must stay inside the output directory: one normal path component, no separators.
fn check_name(name: &str) -> Result<(), CompilerError> {
    let mut components = Path::new(name).components();
    let plain = matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !name.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(CompilerError::UnitName(name.to_string()))
    }
}

/// Every name is checked before anything is written.
pub fn write_units(
    units: &[CompiledUnit],
    out_dir: &Path,
    template: &str,
) -> Result<Vec<PathBuf>, CompilerError> {
    for name in units.iter().filter_map(|unit| unit.name.as_deref()) {
        check_name(name)?;
    }
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(units.len());
    for (unit, name) in units.iter().zip(file_names(units)) {
        let path = out_dir.join(name);
        fs::write(&path, wrap(template, &unit.body)?)?;
        info!(path = %path.display(), unclassified = unit.unclassified, "wrote unit");
        written.push(path);
    }
    Ok(written)
}

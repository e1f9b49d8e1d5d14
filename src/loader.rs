use std::fs;
use std::path::Path;

use crate::error::GraphError;
use crate::script::ModelScript;

/// Load a JSON model script from disk.
pub fn load_script_from_path(path: impl AsRef<Path>) -> Result<ModelScript, GraphError> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref).map_err(|err| GraphError::io(path_ref, err))?;
    ModelScript::from_json(&contents)
}

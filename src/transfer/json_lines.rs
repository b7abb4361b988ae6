//! One compact operation object per line

use std::io::{BufRead, BufReader, Read, Write};

use serde_json::Value;

use crate::error::{PicsouError, PicsouResult};
use crate::models::{JsonEntity, Operation};

/// Read every non-blank line as an operation
///
/// Operations get fresh identifiers so that importing a file twice into
/// different accounts never produces colliding ids.
pub fn read_operations<R: Read>(reader: R) -> PicsouResult<Vec<Operation>> {
    let mut ops = Vec::new();
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(|e| PicsouError::Import(e.to_string()))?;
        if line.trim().is_empty() {
            continue;
        }
        let json: Value = serde_json::from_str(&line).map_err(|e| {
            PicsouError::CorruptData(format!("line {}: {}", index + 1, e))
        })?;
        let mut parsed = Operation::for_read(None);
        parsed.read(&json).map_err(|e| match e {
            PicsouError::CorruptData(m) => {
                PicsouError::CorruptData(format!("line {}: {}", index + 1, m))
            }
            other => other,
        })?;
        ops.push(Operation::new(parsed.fields().clone()));
    }
    Ok(ops)
}

pub fn write_operations<W: Write>(mut writer: W, ops: &[&Operation]) -> PicsouResult<()> {
    let export_err = |e: std::io::Error| PicsouError::Export(e.to_string());
    for op in ops {
        let line = serde_json::to_string(&op.write()?)?;
        writeln!(writer, "{}", line).map_err(export_err)?;
    }
    writer.flush().map_err(export_err)
}

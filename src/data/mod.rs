mod generate;
mod lp;
mod report;

use crate::core::Curriculum;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

pub use generate::{generate, GeneratorConfig};
pub use lp::write_lp;
pub use report::*;

/// Reads a JSON document from the reader.
///
/// # Errors
/// - If the document is malformed or fails validation while converting.
pub fn deserialize<T: DeserializeOwned>(reader: &mut impl BufRead) -> anyhow::Result<T> {
    Ok(serde_json::from_reader(reader)?)
}

/// Renders the value as pretty-printed JSON.
///
/// # Errors
/// - If the value cannot be represented as JSON.
pub fn to_string<T: Serialize>(value: &T) -> anyhow::Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Loads and validates a curriculum file.
///
/// # Errors
/// - If the file cannot be read or the curriculum is invalid.
pub fn load_curriculum(path: &Path) -> anyhow::Result<Curriculum> {
    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    deserialize(&mut BufReader::new(file)).with_context(|| format!("cannot load {}", path.display()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::core::dataset::test::small_config;

    const BUNDLED: [(&str, &str, usize, usize); 4] = [
        ("cc_ufmg", include_str!("../../curricula/cc_ufmg.json"), 36, 8),
        ("esi_ufmg", include_str!("../../curricula/esi_ufmg.json"), 51, 11),
        ("sin_ufmg", include_str!("../../curricula/sin_ufmg.json"), 34, 9),
        ("sin_ufvjm", include_str!("../../curricula/sin_ufvjm.json"), 46, 9),
    ];

    #[test]
    fn bundled_curricula_are_valid() -> anyhow::Result<()> {
        for (name, text, courses, periods) in BUNDLED {
            let curriculum: Curriculum = deserialize(&mut text.as_bytes())?;
            assert_eq!(curriculum.name(), name);
            assert_eq!(curriculum.courses().len(), courses);
            assert_eq!(curriculum.periods(), periods);
            assert_eq!(curriculum.penultimate().len(), 1);
            assert_eq!(curriculum.last().len(), 1);
        }
        Ok(())
    }

    #[test]
    fn curriculum_survives_serialization() -> anyhow::Result<()> {
        let (_, text, _, _) = BUNDLED[0];
        let curriculum: Curriculum = deserialize(&mut text.as_bytes())?;
        let again: Curriculum = deserialize(&mut to_string(&curriculum)?.as_bytes())?;
        assert_eq!(curriculum, again);
        Ok(())
    }

    #[test]
    fn invalid_documents_are_rejected() {
        let broken = r#"{"name": "x", "periods": 1}"#;
        assert!(deserialize::<Curriculum>(&mut broken.as_bytes()).is_err());
        assert!(load_curriculum(Path::new("curricula/missing.json")).is_err());
    }

    #[test]
    fn course_indices_are_checked_on_load() -> anyhow::Result<()> {
        let document = serde_json::to_value(small_config())?;
        let with = |key: &str, value: serde_json::Value| {
            let mut document = document.clone();
            document[key] = value;
            document.to_string()
        };

        for text in [
            with("prerequisites", serde_json::json!({ "1": [0, 9] })),
            with("prerequisites", serde_json::json!({ "1": [0], "6": [0] })),
            with("leveling", serde_json::json!([6])),
            with("last", serde_json::json!([42])),
        ] {
            assert!(deserialize::<Curriculum>(&mut text.as_bytes()).is_err(), "{text}");
        }
        assert!(deserialize::<Curriculum>(&mut document.to_string().as_bytes()).is_ok());
        Ok(())
    }
}

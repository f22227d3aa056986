//! Import and export of templates and history.
//!
//! Import files are a JSON array of objects or a CSV file with a header row.
//! An import is sent to the backend as one request, so it either lands as a
//! whole or not at all.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::{convert_to_csv, parse_csv, CsvRow, ExportFormat, RestGateway, Result, UtmError};

/// Example files the backend is willing to serve
pub const EXAMPLE_FILES: [&str; 4] = [
    "templates_example.json",
    "templates_example.csv",
    "templates_example_ru.json",
    "templates_example_en.json",
];

// Server-side bookkeeping that an export file should not carry.
const INTERNAL_FIELDS: [&str; 3] = ["id", "user_email", "created_at"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Templates,
    History,
}

impl Collection {
    fn file_stem(self) -> &'static str {
        match self {
            Collection::Templates => "utm_templates",
            Collection::History => "utm_history",
        }
    }
}

/// Where an export ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub count: usize,
    /// False when the backend kept the file on its own disk
    pub written_locally: bool,
}

/// Last component of a filename chosen by the server, so the file always
/// lands inside the output directory.
fn local_file_name(filename: &str) -> Result<std::ffi::OsString> {
    Path::new(filename)
        .file_name()
        .map(|n| n.to_os_string())
        .ok_or_else(|| {
            UtmError::validation(format!("Server returned an unusable filename: '{}'", filename))
        })
}

fn invalid(message: impl Into<String>) -> UtmError {
    UtmError::InvalidImport {
        message: message.into(),
    }
}

/// Reads an import file and stamps every item with `user_email`.
pub fn read_import_file(path: &Path, user_email: &str) -> Result<Vec<Value>> {
    if !path.exists() {
        return Err(UtmError::FileNotFound {
            file_path: path.display().to_string(),
        });
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let content = fs::read_to_string(path)?;

    let rows: Vec<Value> = match extension.as_str() {
        "json" => match serde_json::from_str::<Value>(&content) {
            Ok(Value::Array(items)) => items,
            Ok(_) => return Err(invalid("JSON file must contain an array of records")),
            Err(e) => return Err(invalid(format!("Malformed JSON: {}", e))),
        },
        "csv" => parse_csv(&content).into_iter().map(Value::Object).collect(),
        other => {
            return Err(invalid(format!(
                "Unsupported file type '.{}'; use .json or .csv",
                other
            )))
        }
    };

    if rows.is_empty() {
        return Err(invalid("File contains no records"));
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| match row {
            Value::Object(mut fields) => {
                fields.insert("user_email".to_string(), Value::String(user_email.to_string()));
                Ok(Value::Object(fields))
            }
            _ => Err(invalid(format!("Record {} is not an object", i + 1))),
        })
        .collect()
}

pub async fn import_templates(gateway: &RestGateway, path: &Path) -> Result<usize> {
    let items = read_import_file(path, gateway.user_email())?;
    debug!("Importing {} templates from {}", items.len(), path.display());
    let response = gateway.import_templates(&items).await?;
    info!("Imported {} templates", response.imported_count);
    Ok(response.imported_count)
}

pub async fn import_history(gateway: &RestGateway, path: &Path) -> Result<usize> {
    let items = read_import_file(path, gateway.user_email())?;
    debug!("Importing {} history records from {}", items.len(), path.display());
    let response = gateway.import_history(&items).await?;
    info!("Imported {} history records", response.imported_count);
    Ok(response.imported_count)
}

/// Writes `content` to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|_| UtmError::DirectoryError {
        path: dir.to_path_buf(),
    })?;

    let mut temp_file = NamedTempFile::new_in(dir)?;
    temp_file.write_all(content.as_bytes())?;
    temp_file.flush()?;
    temp_file.persist(path).map_err(|e| UtmError::Io(e.error))?;
    Ok(())
}

/// Asks the backend for an export and saves it under `out_dir`.
pub async fn export_from_server(
    gateway: &RestGateway,
    collection: Collection,
    format: ExportFormat,
    out_dir: &Path,
) -> Result<ExportOutcome> {
    let response = match collection {
        Collection::Templates => gateway.export_templates(format).await?,
        Collection::History => gateway.export_history(format).await?,
    };

    match (response.file_content, response.file_path) {
        (Some(content), _) => {
            let path = out_dir.join(local_file_name(&response.filename)?);
            write_atomic(&path, &content)?;
            info!("Exported {} records to {}", response.count, path.display());
            Ok(ExportOutcome {
                path,
                count: response.count,
                written_locally: true,
            })
        }
        (None, Some(remote)) => Ok(ExportOutcome {
            path: PathBuf::from(remote),
            count: response.count,
            written_locally: false,
        }),
        (None, None) => Err(UtmError::ServerRejected {
            status: 200,
            message: "Export response carried neither file content nor a path".to_string(),
        }),
    }
}

/// Renders records as an export file body without the server-side fields.
pub fn export_body<T: Serialize>(items: &[T], format: ExportFormat) -> Result<String> {
    let rows = items
        .iter()
        .map(|item| -> Result<CsvRow> {
            match serde_json::to_value(item)? {
                Value::Object(fields) => Ok(fields
                    .into_iter()
                    .filter(|(key, _)| !INTERNAL_FIELDS.contains(&key.as_str()))
                    .collect()),
                _ => Err(UtmError::validation("Only records can be exported")),
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(match format {
        ExportFormat::Json => serde_json::to_string_pretty(&rows)?,
        ExportFormat::Csv => convert_to_csv(&rows),
    })
}

/// Writes the records exactly as currently filtered and sorted.
pub fn export_local<T: Serialize>(
    items: &[T],
    collection: Collection,
    format: ExportFormat,
    out_dir: &Path,
    user_email: &str,
) -> Result<ExportOutcome> {
    let body = export_body(items, format)?;
    let filename = format!(
        "{}_{}.{}",
        collection.file_stem(),
        user_email.replace('@', "_"),
        format.extension()
    );
    let path = out_dir.join(filename);
    write_atomic(&path, &body)?;
    info!("Wrote {} records to {}", items.len(), path.display());
    Ok(ExportOutcome {
        path,
        count: items.len(),
        written_locally: true,
    })
}

pub async fn download_example(
    gateway: &RestGateway,
    filename: &str,
    out_dir: &Path,
) -> Result<PathBuf> {
    if !EXAMPLE_FILES.contains(&filename) {
        return Err(UtmError::validation(format!(
            "Unknown example file: {}. Must be one of: {}",
            filename,
            EXAMPLE_FILES.join(", ")
        )));
    }
    let example = gateway.download_example(filename).await?;
    let path = out_dir.join(local_file_name(&example.filename)?);
    write_atomic(&path, &example.file_content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LinkRecord, Template};

    #[test]
    fn json_import_must_be_a_non_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let object = dir.path().join("one.json");
        fs::write(&object, r#"{"name": "x"}"#).unwrap();
        assert!(matches!(
            read_import_file(&object, "me"),
            Err(UtmError::InvalidImport { .. })
        ));

        let empty = dir.path().join("empty.json");
        fs::write(&empty, "[]").unwrap();
        assert!(matches!(
            read_import_file(&empty, "me"),
            Err(UtmError::InvalidImport { .. })
        ));
    }

    #[test]
    fn every_item_gets_the_user_email() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("templates.json");
        fs::write(
            &path,
            r#"[{"name": "A", "user_email": "someone@else"}, {"name": "B"}]"#,
        )
        .unwrap();

        let items = read_import_file(&path, "me@example.com").unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i["user_email"] == "me@example.com"));
    }

    #[test]
    fn csv_import_and_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("templates.CSV");
        fs::write(&csv, "name,utm_source\nSpring,google\n").unwrap();
        let items = read_import_file(&csv, "me").unwrap();
        assert_eq!(items[0]["utm_source"], "google");

        let txt = dir.path().join("templates.txt");
        fs::write(&txt, "name\nx\n").unwrap();
        assert!(matches!(
            read_import_file(&txt, "me"),
            Err(UtmError::InvalidImport { .. })
        ));
        assert!(matches!(
            read_import_file(&dir.path().join("missing.json"), "me"),
            Err(UtmError::FileNotFound { .. })
        ));
    }

    #[test]
    fn local_export_drops_internal_fields() {
        let dir = tempfile::tempdir().unwrap();
        let mut template = Template::new(5, "Spring, 2024", "2024-01-01");
        template.utm_source = Some("google".into());

        let outcome = export_local(
            &[template],
            Collection::Templates,
            ExportFormat::Csv,
            dir.path(),
            "me@example.com",
        )
        .unwrap();
        assert_eq!(
            outcome.path.file_name().unwrap(),
            "utm_templates_me_example.com.csv"
        );

        let text = fs::read_to_string(&outcome.path).unwrap();
        let header = text.lines().next().unwrap();
        assert!(header.starts_with("name,utm_source"));
        assert!(!header.contains("created_at"));
        assert!(text.contains("\"Spring, 2024\",google"));
    }

    #[test]
    fn server_filenames_stay_inside_the_output_dir() {
        assert_eq!(local_file_name("../escaped.json").unwrap(), "escaped.json");
        assert_eq!(local_file_name("/etc/cron.d/job").unwrap(), "job");
        assert_eq!(local_file_name("utm_templates_me.csv").unwrap(), "utm_templates_me.csv");
        assert!(local_file_name("..").is_err());
        assert!(local_file_name("").is_err());
    }

    #[test]
    fn json_export_body_is_an_array() {
        let records = vec![LinkRecord::new(1, "https://a.example/", "2024-01-01")];
        let body = export_body(&records, ExportFormat::Json).unwrap();
        let parsed: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed[0]["full_url"], "https://a.example/");
        assert!(parsed[0].get("id").is_none());
    }
}

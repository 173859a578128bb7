//! Name-keyed metadata table consulted at run time: record offset, minimum
//! version triple and required extension of every capability.

use crate::catalog::identity::{ApiVersion, CapabilityName};
use crate::emit::{Frame, GENERATED_BANNER, SectionEmitter, Site, include_guard, version_triple};
use std::fmt::{self, Write};

enum Row {
    Open(String),
    Entry {
        field: CapabilityName,
        version: ApiVersion,
        extension: String,
    },
    Close,
}

#[derive(Default)]
pub struct TableEmitter {
    rows: Vec<Row>,
}

impl SectionEmitter for TableEmitter {
    fn open(&mut self, guard: Option<&str>) -> fmt::Result {
        if let Some(guard) = guard {
            self.rows.push(Row::Open(guard.to_string()));
        }
        Ok(())
    }

    fn structure(&mut self, site: &Site<'_>) -> fmt::Result {
        for feature in site.features {
            self.rows.push(Row::Entry {
                field: feature.field.clone(),
                version: site.origin.min_version(),
                extension: site.origin.extension().unwrap_or_default().to_string(),
            });
        }
        Ok(())
    }

    fn close(&mut self, guard: Option<&str>, _tail: &str) -> fmt::Result {
        if guard.is_some() {
            self.rows.push(Row::Close);
        }
        Ok(())
    }
}

impl TableEmitter {
    pub fn finish(&self, frame: &Frame<'_>) -> Result<String, fmt::Error> {
        let naming = frame.naming;
        let guard = include_guard(&frame.files.table);
        let mut out = String::new();
        writeln!(out, "{GENERATED_BANNER}")?;
        writeln!(out)?;
        writeln!(out, "#ifndef {guard}")?;
        writeln!(out, "#define {guard}")?;
        writeln!(out)?;
        writeln!(out, "#include <cstddef>")?;
        writeln!(out, "#include <cstdint>")?;
        writeln!(out, "#include <string>")?;
        writeln!(out, "#include <unordered_map>")?;
        writeln!(out)?;
        writeln!(out, "#include \"{}\"", frame.files.header)?;
        writeln!(out)?;
        writeln!(out, "struct {} {{", naming.table_type)?;
        writeln!(out, "\tsize_t offset;")?;
        writeln!(out, "\tuint32_t minVersion[3];")?;
        writeln!(out, "\tstd::string extension;")?;
        writeln!(out, "}};")?;
        writeln!(out)?;
        writeln!(
            out,
            "inline std::unordered_map<std::string, {}> {} {{",
            naming.table_type, naming.table_name
        )?;

        let entry = |out: &mut String, field: &CapabilityName, version: ApiVersion, extension: &str| {
            writeln!(
                out,
                "\t{{ \"{field}\", {{ offsetof( {}, {field} ), {}, \"{extension}\" }} }},",
                naming.record,
                version_triple(version)
            )
        };
        for row in &self.rows {
            match row {
                Row::Open(guard) => writeln!(out, "#if defined( {guard} )")?,
                Row::Entry {
                    field,
                    version,
                    extension,
                } => entry(&mut out, field, *version, extension)?,
                Row::Close => writeln!(out, "#endif")?,
            }
        }
        let root = &frame.root;
        for feature in &root.features {
            entry(
                &mut out,
                &feature.field,
                root.origin.min_version(),
                root.origin.extension().unwrap_or_default(),
            )?;
        }

        writeln!(out, "}};")?;
        writeln!(out)?;
        writeln!(out, "#endif // {guard}")?;
        Ok(out)
    }
}

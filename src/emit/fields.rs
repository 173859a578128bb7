//! Record header: one `bool` per capability plus the two entry points.

use crate::emit::{Frame, GENERATED_BANNER, SectionEmitter, Site, include_guard};
use std::fmt::{self, Write};

#[derive(Default)]
pub struct FieldEmitter {
    body: String,
}

impl SectionEmitter for FieldEmitter {
    fn open(&mut self, guard: Option<&str>) -> fmt::Result {
        if let Some(guard) = guard {
            writeln!(self.body, "#if defined( {guard} )")?;
        }
        Ok(())
    }

    fn structure(&mut self, site: &Site<'_>) -> fmt::Result {
        for feature in site.features {
            writeln!(self.body, "\tbool {};", feature.field)?;
        }
        Ok(())
    }

    fn close(&mut self, guard: Option<&str>, _tail: &str) -> fmt::Result {
        if guard.is_some() {
            writeln!(self.body, "#endif")?;
        }
        Ok(())
    }
}

impl FieldEmitter {
    pub fn finish(&self, frame: &Frame<'_>) -> Result<String, fmt::Error> {
        let guard = include_guard(&frame.files.header);
        let mut out = String::new();
        writeln!(out, "{GENERATED_BANNER}")?;
        writeln!(out)?;
        writeln!(out, "#ifndef {guard}")?;
        writeln!(out, "#define {guard}")?;
        writeln!(out)?;
        writeln!(out, "#include \"{}\"", frame.naming.api_header)?;
        writeln!(out)?;
        writeln!(out, "struct {} {{", frame.naming.record)?;
        out.push_str(&self.body);
        for feature in &frame.root.features {
            writeln!(out, "\tbool {};", feature.field)?;
        }
        writeln!(out, "}};")?;
        writeln!(out)?;
        if let Some(prev) = frame.carried_in {
            writeln!(out, "// chainTail continues a chain that ends at {prev}")?;
        }
        writeln!(out, "{};", frame.query_signature())?;
        writeln!(out)?;
        writeln!(out, "{};", frame.create_signature())?;
        writeln!(out)?;
        writeln!(out, "#endif // {guard}")?;
        Ok(out)
    }
}

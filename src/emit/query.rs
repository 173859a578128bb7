//! Query routine: builds the chain, runs one capability query through the
//! wrapper root and copies every member into the record.

use crate::emit::{Frame, GENERATED_BANNER, SectionEmitter, Site};
use std::fmt::{self, Write};

#[derive(Default)]
pub struct QueryEmitter {
    chain: String,
    copy: String,
}

impl SectionEmitter for QueryEmitter {
    fn open(&mut self, guard: Option<&str>) -> fmt::Result {
        if let Some(guard) = guard {
            writeln!(self.chain, "#if defined( {guard} )")?;
            writeln!(self.copy, "#if defined( {guard} )")?;
        }
        Ok(())
    }

    fn structure(&mut self, site: &Site<'_>) -> fmt::Result {
        writeln!(self.chain, "\t{} {} {{", site.ty, site.var)?;
        writeln!(self.chain, "\t\t.sType = {},", site.s_type)?;
        writeln!(self.chain, "\t\t.pNext = {}", site.next)?;
        writeln!(self.chain, "\t}};")?;
        writeln!(self.chain)?;

        for feature in site.features {
            writeln!(
                self.copy,
                "\tcfg.{} = ( bool ) {}.{};",
                feature.field, site.var, feature.member
            )?;
        }
        Ok(())
    }

    fn close(&mut self, guard: Option<&str>, tail: &str) -> fmt::Result {
        writeln!(self.chain, "\tchainTail = {tail};")?;
        if guard.is_some() {
            writeln!(self.chain, "#endif")?;
            writeln!(self.copy, "#endif")?;
        }
        writeln!(self.chain)?;
        Ok(())
    }
}

impl QueryEmitter {
    pub fn finish(&self, frame: &Frame<'_>) -> Result<String, fmt::Error> {
        let root = &frame.root;
        let mut out = String::new();
        writeln!(out, "{GENERATED_BANNER}")?;
        writeln!(out)?;
        writeln!(out, "#include \"{}\"", frame.files.header)?;
        writeln!(out)?;
        writeln!(out, "{} {{", frame.query_signature())?;
        out.push_str(frame.chain_prologue());
        out.push_str(&self.chain);

        writeln!(out, "\t{} {} {{", root.ty, root.var)?;
        writeln!(out, "\t\t.sType = {},", root.s_type)?;
        writeln!(out, "\t\t.pNext = chainTail")?;
        writeln!(out, "\t}};")?;
        writeln!(out)?;
        writeln!(out, "\tvkGetPhysicalDeviceFeatures2( physicalDevice, &{} );", root.var)?;
        writeln!(out)?;

        if let Some(workaround) = frame.workaround {
            // Queried on its own so the rest of the chain never follows it.
            if let Some(guard) = &workaround.guard {
                writeln!(out, "#if defined( {guard} )")?;
            }
            writeln!(out, "\tif ( {} ) {{", workaround.flag)?;
            writeln!(out, "\t\t{}.pNext = nullptr;", workaround.var)?;
            writeln!(out)?;
            writeln!(out, "\t\t{} workaroundQuery {{", root.ty)?;
            writeln!(out, "\t\t\t.sType = {},", root.s_type)?;
            writeln!(out, "\t\t\t.pNext = &{}", workaround.var)?;
            writeln!(out, "\t\t}};")?;
            writeln!(out)?;
            writeln!(
                out,
                "\t\tvkGetPhysicalDeviceFeatures2( physicalDevice, &workaroundQuery );"
            )?;
            writeln!(out, "\t}}")?;
            if workaround.guard.is_some() {
                writeln!(out, "#endif")?;
            }
            writeln!(out)?;
        }

        out.push_str(&self.copy);
        for feature in &root.features {
            writeln!(
                out,
                "\tcfg.{} = ( bool ) {}.{}.{};",
                feature.field, root.var, root.nested_field, feature.member
            )?;
        }
        writeln!(out, "}}")?;
        Ok(out)
    }
}

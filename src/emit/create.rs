//! Creation routine: rebuilds the chain from the record and hands it to
//! device creation, returning its status unchanged.

use crate::canonical::CanonicalFeature;
use crate::emit::{Frame, GENERATED_BANNER, SectionEmitter, Site};
use std::fmt::{self, Write};

#[derive(Default)]
pub struct CreateEmitter {
    chain: String,
}

impl SectionEmitter for CreateEmitter {
    fn open(&mut self, guard: Option<&str>) -> fmt::Result {
        if let Some(guard) = guard {
            writeln!(self.chain, "#if defined( {guard} )")?;
        }
        Ok(())
    }

    fn structure(&mut self, site: &Site<'_>) -> fmt::Result {
        writeln!(self.chain, "\t{} {} {{", site.ty, site.var)?;
        writeln!(self.chain, "\t\t.sType = {},", site.s_type)?;
        write!(self.chain, "\t\t.pNext = {}", site.next)?;
        write_members(&mut self.chain, site.features, "\t\t")?;
        writeln!(self.chain)?;
        writeln!(self.chain, "\t}};")?;
        writeln!(self.chain)?;
        Ok(())
    }

    fn close(&mut self, guard: Option<&str>, tail: &str) -> fmt::Result {
        writeln!(self.chain, "\tchainTail = {tail};")?;
        if guard.is_some() {
            writeln!(self.chain, "#endif")?;
        }
        writeln!(self.chain)?;
        Ok(())
    }
}

/// Designated initializers continuing an open initializer list.
fn write_members(out: &mut String, features: &[CanonicalFeature], indent: &str) -> fmt::Result {
    for feature in features {
        writeln!(out, ",")?;
        write!(out, "{indent}.{} = cfg.{}", feature.member, feature.field)?;
    }
    Ok(())
}

impl CreateEmitter {
    pub fn finish(&self, frame: &Frame<'_>) -> Result<String, fmt::Error> {
        let root = &frame.root;
        let mut out = String::new();
        writeln!(out, "{GENERATED_BANNER}")?;
        writeln!(out)?;
        writeln!(out, "#include \"{}\"", frame.files.header)?;
        writeln!(out)?;
        writeln!(out, "{} {{", frame.create_signature())?;
        out.push_str(frame.chain_prologue());
        out.push_str(&self.chain);

        writeln!(out, "\t{} {} {{", root.ty, root.var)?;
        writeln!(out, "\t\t.sType = {},", root.s_type)?;
        write!(out, "\t\t.pNext = chainTail")?;
        if !root.features.is_empty() {
            writeln!(out, ",")?;
            write!(out, "\t\t.{} = {{", root.nested_field)?;
            let mut members = String::new();
            write_members(&mut members, &root.features, "\t\t\t")?;
            // Drop the leading comma; the nested list opens fresh.
            out.push_str(members.strip_prefix(',').unwrap_or(&members));
            writeln!(out)?;
            write!(out, "\t\t}}")?;
        }
        writeln!(out)?;
        writeln!(out, "\t}};")?;
        writeln!(out)?;
        writeln!(out, "\tdeviceInfo.pNext = &{};", root.var)?;
        writeln!(out, "\tdeviceInfo.pEnabledFeatures = nullptr;")?;
        writeln!(out)?;
        writeln!(
            out,
            "\treturn vkCreateDevice( physicalDevice, &deviceInfo, allocator, device );"
        )?;
        writeln!(out, "}}")?;
        Ok(out)
    }
}

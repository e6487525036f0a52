/*++

Licensed under the Apache-2.0 license.

File Name:

   cheader.rs

Abstract:

    File contains the C rendering of the software visible partitions of an
    OTP memory image.

--*/

use crate::MemoryImage;
use otpgen_error::{OtpError, OtpResult};
use otpgen_types::format_hex;
use serde_derive::Serialize;
use std::collections::BTreeMap;
use tinytemplate::{format_unescaped, TinyTemplate};

/// Template used when the caller does not supply one
pub const DEFAULT_C_TEMPLATE: &str = include_str!("otp_img.c.tpl");

/// Partitions left out of the C rendering
const SKIPPED_PARTITIONS: [&str; 7] = [
    "VENDOR_TEST",
    "HW_CFG0",
    "HW_CFG1",
    "SECRET0",
    "SECRET1",
    "SECRET2",
    "LIFE_CYCLE",
];

/// Software write granule per partition, in bytes
const WRITE_ALIGNMENT: [(&str, usize); 9] = [
    ("CREATOR_SW_CFG", 4),
    ("OWNER_SW_CFG", 4),
    ("HW_CFG0", 4),
    ("HW_CFG1", 4),
    ("ROT_CREATOR_AUTH_CODESIGN", 4),
    ("ROT_CREATOR_AUTH_STATE", 4),
    ("SECRET0", 8),
    ("SECRET1", 8),
    ("SECRET2", 8),
];

/// Which partitions are rendered and with which word size.
#[derive(Debug, Clone)]
pub struct CHeaderOptions {
    pub skip: Vec<String>,
    pub alignment: BTreeMap<String, usize>,
}

impl Default for CHeaderOptions {
    fn default() -> Self {
        Self {
            skip: SKIPPED_PARTITIONS.iter().map(|p| p.to_string()).collect(),
            alignment: WRITE_ALIGNMENT
                .iter()
                .map(|(p, a)| (p.to_string(), *a))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CHeaderItem {
    pub name: String,
    pub offset_name: String,

    /// Words of `alignment` bytes, least significant first
    pub values: Vec<String>,
    pub is_mubi: bool,
    pub num_items: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CHeaderPartition {
    pub name: String,
    pub alignment: usize,
    pub word_type: String,
    pub items: Vec<CHeaderItem>,
}

#[derive(Serialize)]
struct TemplateContext<'a> {
    fileheader: &'a str,
    partitions: &'a [CHeaderPartition],
}

impl MemoryImage {
    /// Collect the items with a value of every rendered partition.
    ///
    /// Items narrower than the partition's write granule are left out.
    pub fn c_header_data(&self, options: &CHeaderOptions) -> OtpResult<Vec<CHeaderPartition>> {
        let mut partitions = Vec::new();
        for (idx, part) in self.map().partitions().iter().enumerate() {
            if options.skip.contains(&part.name) {
                continue;
            }
            let mut items = Vec::new();
            for (j, item) in part.items.iter().enumerate() {
                let Some(value) = self.resolved_value(idx, j)? else {
                    continue;
                };
                let alignment = *options
                    .alignment
                    .get(&part.name)
                    .ok_or_else(|| OtpError::unknown("write alignment of partition", &part.name))?;
                if item.size < alignment {
                    continue;
                }
                if item.size % alignment != 0 {
                    return Err(OtpError::Misaligned {
                        what: format!("item {}.{}", part.name, item.name),
                        value: item.size,
                        alignment,
                    });
                }
                items.push(CHeaderItem {
                    name: item.name.clone(),
                    offset_name: format!("{}_OFFSET", item.name),
                    values: value.chunks(alignment).map(format_hex).collect(),
                    is_mubi: item.is_mubi,
                    num_items: item.size / alignment,
                });
            }
            if let Some(&alignment) = options.alignment.get(&part.name) {
                if !items.is_empty() {
                    partitions.push(CHeaderPartition {
                        name: part.name.clone(),
                        alignment,
                        word_type: format!("uint{}_t", alignment * 8),
                        items,
                    });
                }
            }
        }
        Ok(partitions)
    }

    /// Render the C file from `template`, or from [`DEFAULT_C_TEMPLATE`].
    pub fn render_c_file(
        &self,
        fileheader: &str,
        template: Option<&str>,
        options: &CHeaderOptions,
    ) -> OtpResult<String> {
        let partitions = self.c_header_data(options)?;
        let template_error = |e: tinytemplate::error::Error| {
            OtpError::InvalidConfig(format!("C template: {e}"))
        };

        let mut tt = TinyTemplate::new();
        tt.set_default_formatter(&format_unescaped);
        tt.add_template("c_file", template.unwrap_or(DEFAULT_C_TEMPLATE))
            .map_err(template_error)?;
        tt.render(
            "c_file",
            &TemplateContext {
                fileheader,
                partitions: &partitions,
            },
        )
        .map_err(template_error)
    }
}

// Licensed under the Apache-2.0 license

use crate::map::MemoryMap;
use crate::partition::LockMode;

/// Partitions left out of the item description table
const UNDESCRIBED_PARTITIONS: [&str; 2] = ["VENDOR_TEST", "LIFE_CYCLE"];

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

/// Markdown pipe table
struct Table {
    header: Vec<String>,
    align: Vec<Align>,
    rows: Vec<Vec<String>>,
}

impl Table {
    fn new(header: &[&str], align: Vec<Align>) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            align,
            rows: Vec::new(),
        }
    }

    fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    fn render(&self) -> String {
        let widths: Vec<usize> = (0..self.header.len())
            .map(|col| {
                self.rows
                    .iter()
                    .filter_map(|row| row.get(col))
                    .chain(std::iter::once(&self.header[col]))
                    .map(|cell| cell.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| -> String {
            let padded: Vec<String> = widths
                .iter()
                .zip(&self.align)
                .enumerate()
                .map(|(col, (&width, &align))| {
                    let cell = cells.get(col).map(String::as_str).unwrap_or("");
                    match align {
                        Align::Left => format!(" {cell:<width$} "),
                        Align::Center => format!(" {cell:^width$} "),
                    }
                })
                .collect();
            format!("|{}|", padded.join("|"))
        };

        let separator: Vec<String> = widths
            .iter()
            .zip(&self.align)
            .map(|(&width, &align)| match align {
                Align::Left => format!(":{}", "-".repeat(width + 1)),
                Align::Center => format!(":{}:", "-".repeat(width)),
            })
            .collect();

        let mut out = vec![line(self.header.as_slice()), format!("|{}|", separator.join("|"))];
        out.extend(self.rows.iter().map(|row| line(row.as_slice())));
        out.join("\n")
    }
}

fn lockable(mode: LockMode) -> String {
    if mode.is_lockable() {
        format!("yes ({mode})")
    } else {
        "no".into()
    }
}

fn yes_no(value: bool) -> String {
    let text = if value { "yes" } else { "no" };
    text.into()
}

fn register_link(name: &str) -> String {
    format!("[{name}](#Reg_{}_0)", name.to_lowercase())
}

impl MemoryMap {
    /// Documentation table of all partitions and their properties
    pub fn partitions_table(&self) -> String {
        let header = [
            "Partition",
            "Secret",
            "Buffered",
            "Integrity",
            "WR Lockable",
            "RD Lockable",
            "Description",
        ];
        let mut align = vec![Align::Center; header.len() - 1];
        align.push(Align::Left);
        let mut table = Table::new(&header, align);

        for part in self.partitions() {
            table.push(vec![
                part.name.clone(),
                yes_no(part.secret),
                yes_no(part.variant.is_buffered()),
                yes_no(part.integrity),
                lockable(part.write_lock),
                lockable(part.read_lock),
                part.desc.clone().unwrap_or_default(),
            ]);
        }
        table.render()
    }

    /// Documentation table of the resolved item addresses
    pub fn mmap_table(&self) -> String {
        let header = [
            "Index",
            "Partition",
            "Size [B]",
            "Access Granule",
            "Item",
            "Byte Address",
            "Size [B]",
        ];
        let mut table = Table::new(&header, vec![Align::Center; header.len()]);

        for (k, part) in self.partitions().iter().enumerate() {
            for (j, item) in part.items.iter().enumerate() {
                let granule = if part.secret || item.is_digest {
                    "64bit"
                } else {
                    "32bit"
                };
                let name = if item.is_digest {
                    register_link(&item.name)
                } else {
                    item.name.clone()
                };
                let mut row = if j == 0 {
                    vec![k.to_string(), part.name.clone(), part.size.to_string()]
                } else {
                    vec![String::new(); 3]
                };
                row.extend([
                    granule.to_string(),
                    name,
                    format!("0x{:03X}", item.offset),
                    item.size.to_string(),
                ]);
                table.push(row);
            }
        }
        table.render()
    }

    /// Documentation table of item descriptions. Secret partitions and
    /// digest items are left out.
    pub fn description_table(&self) -> String {
        let header = ["Partition", "Item", "Size [B]", "Description"];
        let mut align = vec![Align::Center; header.len() - 1];
        align.push(Align::Left);
        let mut table = Table::new(&header, align);

        for part in self.partitions() {
            if part.secret || UNDESCRIBED_PARTITIONS.contains(&part.name.as_str()) {
                continue;
            }
            for (j, item) in part.items.iter().enumerate() {
                if item.is_digest {
                    continue;
                }
                let desc = item
                    .desc
                    .as_deref()
                    .unwrap_or_default()
                    .lines()
                    .collect::<Vec<_>>()
                    .join(" ");
                table.push(vec![
                    if j == 0 { part.name.clone() } else { String::new() },
                    item.name.clone(),
                    item.size.to_string(),
                    desc,
                ]);
            }
        }
        table.render()
    }

    /// Documentation table of the partition digests
    pub fn digests_table(&self) -> String {
        let header = ["Digest Name", " Affected Partition", "Calculated by HW"];
        let mut table = Table::new(&header, vec![Align::Center; header.len()]);

        for part in self.partitions().iter().filter(|p| p.has_digest()) {
            if let Some(item) = part.digest_item() {
                table.push(vec![
                    register_link(&item.name),
                    part.name.clone(),
                    yes_no(part.hw_digest),
                ]);
            }
        }
        table.render()
    }
}

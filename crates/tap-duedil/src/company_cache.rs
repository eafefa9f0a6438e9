//! Company cache file
//!
//! The `query` command materializes the companies it finds as
//! newline-delimited JSON, one `{"companyId", "countryCode"}` object per line.
//! The `sync` command reads the same file back. Blank lines are ignored.

use crate::error::{Result, TapError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Identifies one company across every endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyRef {
    pub company_id: String,
    pub country_code: String,
}

impl CompanyRef {
    pub fn new(company_id: impl Into<String>, country_code: impl Into<String>) -> Self {
        Self {
            company_id: company_id.into(),
            country_code: country_code.into(),
        }
    }
}

impl std::fmt::Display for CompanyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.country_code, self.company_id)
    }
}

/// Write companies in order, one JSON object per line
pub fn write_companies(path: impl AsRef<Path>, companies: &[CompanyRef]) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for company in companies {
        serde_json::to_writer(&mut out, company)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;
    Ok(())
}

/// Read companies in file order
pub fn read_companies(path: impl AsRef<Path>) -> Result<Vec<CompanyRef>> {
    let reader = BufReader::new(File::open(path)?);
    let mut companies = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let company = serde_json::from_str(line).map_err(|e| TapError::EntityCache {
            line: index + 1,
            message: e.to_string(),
        })?;
        companies.push(company);
    }

    Ok(companies)
}

//! Table extraction for archived basketball box-score pages.
//!
//! Pages carry one `#line_score` table and, per team, a `box-{TEAM}-game-basic`
//! and `box-{TEAM}-game-advanced` table. Decorative rows (`tr.over_header`,
//! `tr.thead`) are skipped wherever they appear, so the last remaining header
//! row names the real columns.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

use crate::error::PageError;

static TABLE: Lazy<Selector> = Lazy::new(|| selector("table"));
static HEAD_ROWS: Lazy<Selector> = Lazy::new(|| selector("thead > tr"));
static BODY_ROWS: Lazy<Selector> = Lazy::new(|| selector("tbody > tr"));
static FOOT_ROWS: Lazy<Selector> = Lazy::new(|| selector("tfoot > tr"));
static CELLS: Lazy<Selector> = Lazy::new(|| selector("th, td"));
static BOTTOM_NAV: Lazy<Selector> = Lazy::new(|| selector("#bottom_nav_container"));
static LINKS: Lazy<Selector> = Lazy::new(|| selector("a[href]"));

const LINE_SCORE_ID: &str = "line_score";
const DECORATIVE_ROW_CLASSES: [&str; 2] = ["over_header", "thead"];

fn selector(raw: &str) -> Selector {
    Selector::parse(raw).expect("static selector is valid")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Basic,
    Advanced,
}

impl StatKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatKind::Basic => "basic",
            StatKind::Advanced => "advanced",
        }
    }

    pub fn table_id(self, team: &str) -> String {
        format!("box-{team}-game-{}", self.as_str())
    }
}

/// Text cells of one table: the real header row plus every data row.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineScoreEntry {
    pub team: String,
    pub total: u32,
}

/// A per-team stat table coerced to numbers. The index column (player name)
/// is split off; the last row is the team aggregate.
#[derive(Debug, Clone, Default)]
pub struct StatTable {
    pub columns: Vec<String>,
    pub index: Vec<String>,
    pub rows: Vec<Vec<Option<f64>>>,
}

impl StatTable {
    pub fn from_raw(raw: &RawTable) -> Self {
        let columns = raw.header.iter().skip(1).cloned().collect::<Vec<_>>();
        let mut index = Vec::with_capacity(raw.rows.len());
        let mut rows = Vec::with_capacity(raw.rows.len());
        for row in &raw.rows {
            index.push(row.first().cloned().unwrap_or_default());
            let mut values = row
                .iter()
                .skip(1)
                .map(|cell| coerce_numeric(cell))
                .collect::<Vec<_>>();
            values.resize(columns.len(), None);
            rows.push(values);
        }
        Self {
            columns,
            index,
            rows,
        }
    }

    /// The trailing aggregate row, or all-missing when the table is empty.
    pub fn totals(&self) -> Vec<Option<f64>> {
        self.rows
            .last()
            .cloned()
            .unwrap_or_else(|| vec![None; self.columns.len()])
    }

    /// Column-wise max over every row except the aggregate. Missing cells are
    /// skipped; a column with no present value stays missing.
    pub fn player_max(&self) -> Vec<Option<f64>> {
        let players = &self.rows[..self.rows.len().saturating_sub(1)];
        (0..self.columns.len())
            .map(|col| {
                players
                    .iter()
                    .filter_map(|row| row.get(col).copied().flatten())
                    .fold(None, |best: Option<f64>, v| {
                        Some(best.map_or(v, |b| b.max(v)))
                    })
            })
            .collect()
    }
}

/// Any cell that is not a finite number becomes missing.
pub fn coerce_numeric(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

pub struct BoxScorePage {
    doc: Html,
}

impl BoxScorePage {
    pub fn parse(html: &str) -> Self {
        Self {
            doc: Html::parse_document(html),
        }
    }

    pub fn table(&self, id: &str) -> Result<RawTable, PageError> {
        let table = self
            .doc
            .select(&TABLE)
            .find(|t| t.value().attr("id") == Some(id))
            .ok_or_else(|| PageError::MissingTable { id: id.to_string() })?;

        let header = table
            .select(&HEAD_ROWS)
            .filter(|tr| !is_decorative(tr))
            .last()
            .map(|tr| row_cells(&tr))
            .unwrap_or_default();

        let rows = table
            .select(&BODY_ROWS)
            .chain(table.select(&FOOT_ROWS))
            .filter(|tr| !is_decorative(tr))
            .map(|tr| row_cells(&tr))
            .collect();

        Ok(RawTable { header, rows })
    }

    /// Teams in the order the line score lists them, with final totals.
    pub fn line_score(&self) -> Result<Vec<LineScoreEntry>, PageError> {
        let raw = self.table(LINE_SCORE_ID)?;
        let mut out = Vec::with_capacity(2);
        for row in &raw.rows {
            let (Some(team), Some(total)) = (row.first(), row.last()) else {
                continue;
            };
            if row.len() < 2 {
                return Err(PageError::MalformedLineScore {
                    reason: format!("row for `{team}` has no total column"),
                });
            }
            let total = total
                .trim()
                .parse::<u32>()
                .map_err(|_| PageError::MalformedLineScore {
                    reason: format!("total `{total}` for `{team}` is not an integer"),
                })?;
            out.push(LineScoreEntry {
                team: team.trim().to_string(),
                total,
            });
        }
        if out.len() != 2 {
            return Err(PageError::MalformedLineScore {
                reason: format!("expected 2 teams, found {}", out.len()),
            });
        }
        Ok(out)
    }

    pub fn team_stats(&self, team: &str, kind: StatKind) -> Result<StatTable, PageError> {
        let raw = self.table(&kind.table_id(team))?;
        Ok(StatTable::from_raw(&raw))
    }

    /// Season from the second link of the bottom navigation block.
    pub fn season(&self) -> Result<i32, PageError> {
        let nav = self
            .doc
            .select(&BOTTOM_NAV)
            .next()
            .ok_or(PageError::ElementNotFound {
                context: "bottom navigation (#bottom_nav_container)",
            })?;
        let href = nav
            .select(&LINKS)
            .filter_map(|a| a.value().attr("href"))
            .nth(1)
            .ok_or(PageError::ElementNotFound {
                context: "second link in bottom navigation",
            })?;
        parse_season_href(href)
    }
}

pub fn parse_season_href(href: &str) -> Result<i32, PageError> {
    let file = href.rsplit('/').next().unwrap_or(href);
    let prefix = file.split('_').next().unwrap_or(file);
    prefix.trim().parse::<i32>().map_err(|_| PageError::BadSeason {
        href: href.to_string(),
    })
}

fn is_decorative(tr: &ElementRef) -> bool {
    tr.value()
        .classes()
        .any(|c| DECORATIVE_ROW_CLASSES.contains(&c))
}

fn row_cells(tr: &ElementRef) -> Vec<String> {
    tr.select(&CELLS)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect()
}

use std::collections::HashMap;
use std::collections::HashSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;

use crate::box_score::{BoxScorePage, StatKind};
use crate::error::PageError;

pub const OPP_SUFFIX: &str = "_opp";
const MAX_SUFFIX: &str = "_max";
const EXCLUDED_STAT_FRAGMENT: &str = "bpm";

/// Per-team aggregates before projection: lower-cased totals followed by
/// `<stat>_max` player maxima, in table order, duplicates included.
#[derive(Debug, Clone, Default)]
pub struct TeamSummary {
    pub names: Vec<String>,
    pub values: Vec<Option<f64>>,
}

impl TeamSummary {
    pub fn from_page(page: &BoxScorePage, team: &str) -> Result<Self, PageError> {
        let basic = page.team_stats(team, StatKind::Basic)?;
        let advanced = page.team_stats(team, StatKind::Advanced)?;

        let mut out = Self::default();
        for table in [&basic, &advanced] {
            for (name, value) in table.columns.iter().zip(table.totals()) {
                out.names.push(name.to_lowercase());
                out.values.push(value);
            }
        }
        for table in [&basic, &advanced] {
            for (name, value) in table.columns.iter().zip(table.player_max()) {
                out.names.push(format!("{}{MAX_SUFFIX}", name.to_lowercase()));
                out.values.push(value);
            }
        }
        Ok(out)
    }

    fn first_positions(&self) -> HashMap<&str, usize> {
        let mut out = HashMap::with_capacity(self.names.len());
        for (idx, name) in self.names.iter().enumerate() {
            out.entry(name.as_str()).or_insert(idx);
        }
        out
    }
}

/// Canonical stat columns every game row carries, frozen after the first
/// successfully parsed page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseColumns {
    names: Vec<String>,
}

impl BaseColumns {
    pub fn establish<S: AsRef<str>>(candidates: &[S]) -> Self {
        let mut seen = HashSet::new();
        let names = candidates
            .iter()
            .map(|c| c.as_ref())
            .filter(|c| !c.contains(EXCLUDED_STAT_FRAGMENT))
            .filter(|c| seen.insert(*c))
            .map(str::to_string)
            .collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Values of `summary` in base order. Extra columns are dropped; a missing
    /// base column fails the page.
    pub fn project(&self, summary: &TeamSummary) -> Result<Vec<Option<f64>>, PageError> {
        let positions = summary.first_positions();
        self.names
            .iter()
            .map(|name| {
                positions
                    .get(name.as_str())
                    .map(|idx| summary.values[*idx])
                    .ok_or_else(|| PageError::MissingColumn {
                        column: name.clone(),
                    })
            })
            .collect()
    }
}

/// Holds the one-shot column set for a build run.
#[derive(Debug, Clone, Default)]
pub struct ColumnContext {
    base: Option<BaseColumns>,
}

impl ColumnContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base(base: BaseColumns) -> Self {
        Self { base: Some(base) }
    }

    pub fn base(&self) -> Option<&BaseColumns> {
        self.base.as_ref()
    }

    pub fn into_base(self) -> Option<BaseColumns> {
        self.base
    }

    /// Assembles a page, establishing the base columns from it if none exist
    /// yet. The set is only committed when both teams assemble, so callers
    /// run every other page check before this.
    pub fn assemble(&mut self, page: &BoxScorePage) -> Result<[TeamGameStat; 2]> {
        if let Some(base) = &self.base {
            return assemble_game(page, base);
        }
        let candidate = establish_columns(page)?;
        let stats = assemble_game(page, &candidate)?;
        self.base = Some(candidate);
        Ok(stats)
    }
}

/// One team's projected statistics for one game.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamGameStat {
    pub team: String,
    pub total: u32,
    pub stats: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameRow {
    pub team: String,
    pub total: u32,
    pub home: u8,
    pub stats: Vec<Option<f64>>,
}

/// A team's row joined with its opponent's row for the same game.
#[derive(Debug, Clone, PartialEq)]
pub struct PairedGameRow {
    pub own: GameRow,
    pub opp: GameRow,
    pub season: i32,
    pub date: NaiveDate,
    pub won: bool,
}

pub fn establish_columns(page: &BoxScorePage) -> Result<BaseColumns> {
    let line = page.line_score()?;
    let first = line
        .first()
        .context("line score has no teams to establish columns from")?;
    let summary = TeamSummary::from_page(page, &first.team)
        .with_context(|| format!("summarize {}", first.team))?;
    Ok(BaseColumns::establish(&summary.names))
}

pub fn assemble_game(page: &BoxScorePage, base: &BaseColumns) -> Result<[TeamGameStat; 2]> {
    let line = page.line_score()?;
    let mut out = Vec::with_capacity(2);
    for entry in line {
        let summary = TeamSummary::from_page(page, &entry.team)
            .with_context(|| format!("summarize {}", entry.team))?;
        let stats = base
            .project(&summary)
            .with_context(|| format!("project {} onto base columns", entry.team))?;
        out.push(TeamGameStat {
            team: entry.team,
            total: entry.total,
            stats,
        });
    }
    let [first, second]: [TeamGameStat; 2] = out
        .try_into()
        .map_err(|_| anyhow::anyhow!("line score did not yield two teams"))?;
    Ok([first, second])
}

/// Pairs the two teams of a game. The first listed team gets `home = 0`,
/// the second `home = 1`; venue data is not consulted.
pub fn pair_game(stats: [TeamGameStat; 2], season: i32, date: NaiveDate) -> [PairedGameRow; 2] {
    let [first, second] = stats;
    let away = GameRow {
        team: first.team,
        total: first.total,
        home: 0,
        stats: first.stats,
    };
    let home = GameRow {
        team: second.team,
        total: second.total,
        home: 1,
        stats: second.stats,
    };
    [
        paired(away.clone(), home.clone(), season, date),
        paired(home, away, season, date),
    ]
}

fn paired(own: GameRow, opp: GameRow, season: i32, date: NaiveDate) -> PairedGameRow {
    let won = own.total > opp.total;
    PairedGameRow {
        own,
        opp,
        season,
        date,
        won,
    }
}

/// Column names of a persisted paired row, index column excluded.
pub fn paired_columns(base: &BaseColumns) -> Vec<String> {
    let mut out = Vec::with_capacity(base.len() * 2 + 9);
    out.extend(base.names().iter().cloned());
    out.extend(["team", "total", "home"].map(String::from));
    out.extend(base.names().iter().map(|n| format!("{n}{OPP_SUFFIX}")));
    out.extend(["team", "total", "home"].map(|n| format!("{n}{OPP_SUFFIX}")));
    out.extend(["season", "date", "won"].map(String::from));
    out
}

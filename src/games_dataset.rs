use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use csv::StringRecord;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::box_score::BoxScorePage;
use crate::error::PageError;
use crate::game_rows::{
    self, BaseColumns, ColumnContext, PairedGameRow, TeamGameStat, paired_columns,
};

const PROGRESS_EVERY: usize = 100;
const DATE_FORMAT: &str = "%Y-%m-%d";
const META_COLUMNS: [&str; 5] = ["team", "team_opp", "season", "date", "won"];

/// One archived box-score file; the date comes from its `YYYYMMDD` name prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePage {
    pub path: PathBuf,
    pub date: NaiveDate,
}

impl GamePage {
    pub fn from_path(path: &Path) -> Result<Self, PageError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            date: parse_file_date(name)?,
        })
    }

    pub fn load(&self) -> Result<BoxScorePage> {
        let html = fs::read_to_string(&self.path)
            .with_context(|| format!("read box score {}", self.path.display()))?;
        Ok(BoxScorePage::parse(&html))
    }
}

pub fn parse_file_date(name: &str) -> Result<NaiveDate, PageError> {
    let bad = || PageError::BadDate {
        name: name.to_string(),
    };
    let stamp = name.get(..8).ok_or_else(bad)?;
    if !stamp.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    NaiveDate::parse_from_str(stamp, "%Y%m%d").map_err(|_| bad())
}

/// `*.html` files under `dir`, sorted by file name.
pub fn discover_pages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("list box scores in {}", dir.display()))?;
    for entry in entries {
        let path = entry.context("read directory entry")?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("html") {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

#[derive(Debug, Clone, Serialize)]
pub struct PageFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub pages_total: usize,
    pub pages_parsed: usize,
    pub rows: usize,
    pub failures: Vec<PageFailure>,
}

/// All paired rows of a build, in page discovery order.
#[derive(Debug, Clone)]
pub struct GameDataset {
    pub base: BaseColumns,
    pub rows: Vec<PairedGameRow>,
}

impl GameDataset {
    pub fn header(&self) -> StringRecord {
        let mut header = StringRecord::new();
        header.push_field("");
        for name in paired_columns(&self.base) {
            header.push_field(&name);
        }
        header
    }

    pub fn records(&self) -> impl Iterator<Item = StringRecord> + '_ {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| row_record(idx, row))
    }

    pub fn to_table(&self) -> Result<GameTable> {
        GameTable::from_records(&self.header(), self.records())
    }
}

fn row_record(idx: usize, row: &PairedGameRow) -> StringRecord {
    let mut rec = StringRecord::new();
    rec.push_field(&idx.to_string());
    for side in [&row.own, &row.opp] {
        for value in &side.stats {
            rec.push_field(&format_value(*value));
        }
        rec.push_field(&side.team);
        rec.push_field(&side.total.to_string());
        rec.push_field(&side.home.to_string());
    }
    rec.push_field(&row.season.to_string());
    rec.push_field(&row.date.format(DATE_FORMAT).to_string());
    rec.push_field(if row.won { "True" } else { "False" });
    rec
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn build_dataset(dir: &Path, parallelism: usize) -> Result<(GameDataset, BuildSummary)> {
    let pages = discover_pages(dir)?;
    build_from_pages(&pages, parallelism)
}

/// Parses pages until the first success fixes the base columns, then parses
/// the remainder against that frozen set on a bounded pool. A failing page
/// is recorded and skipped.
pub fn build_from_pages(
    pages: &[PathBuf],
    parallelism: usize,
) -> Result<(GameDataset, BuildSummary)> {
    let total = pages.len();
    let mut ctx = ColumnContext::new();
    let mut outcomes: Vec<Result<[PairedGameRow; 2]>> = Vec::with_capacity(total);

    let mut cursor = 0usize;
    while cursor < total && ctx.base().is_none() {
        outcomes.push(process_page(&pages[cursor], |page| ctx.assemble(page)));
        cursor += 1;
    }

    let Some(base) = ctx.into_base() else {
        return Err(anyhow!("no box-score page could be parsed out of {total}"));
    };

    let done = AtomicUsize::new(cursor);
    let rest = with_parse_pool(parallelism, || {
        pages[cursor..]
            .par_iter()
            .map(|path| {
                let out = process_page(path, |page| game_rows::assemble_game(page, &base));
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                if n % PROGRESS_EVERY == 0 {
                    info!("{n} / {total}");
                }
                out
            })
            .collect::<Vec<_>>()
    });
    outcomes.extend(rest);

    let mut rows = Vec::with_capacity(total * 2);
    let mut failures = Vec::new();
    for (path, outcome) in pages.iter().zip(outcomes) {
        match outcome {
            Ok(pair) => rows.extend(pair),
            Err(err) => {
                warn!(path = %path.display(), error = %format!("{err:#}"), "skipping page");
                failures.push(PageFailure {
                    path: path.clone(),
                    error: format!("{err:#}"),
                });
            }
        }
    }

    if rows.is_empty() {
        bail!(
            "no box-score page could be parsed out of {total} ({} failures)",
            failures.len()
        );
    }

    let summary = BuildSummary {
        pages_total: total,
        pages_parsed: total - failures.len(),
        rows: rows.len(),
        failures,
    };
    Ok((GameDataset { base, rows }, summary))
}

fn process_page<F>(path: &Path, assemble: F) -> Result<[PairedGameRow; 2]>
where
    F: FnOnce(&BoxScorePage) -> Result<[TeamGameStat; 2]>,
{
    let page = GamePage::from_path(path)?;
    let doc = page.load()?;
    let season = doc.season()?;
    // Assembly is the last fallible step: it may fix the column set.
    let stats = assemble(&doc)?;
    Ok(game_rows::pair_game(stats, season, page.date))
}

fn with_parse_pool<T>(threads: usize, action: impl FnOnce() -> T + Send) -> T
where
    T: Send,
{
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads.clamp(1, 32))
        .build()
    {
        Ok(pool) => pool.install(action),
        Err(_) => action(),
    }
}

pub fn write_csv(path: &Path, dataset: &GameDataset) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    writer.write_record(&dataset.header()).context("write csv header")?;
    for rec in dataset.records() {
        writer.write_record(&rec).context("write csv row")?;
    }
    writer.flush().context("flush csv")?;
    Ok(())
}

pub fn write_report(path: &Path, summary: &BuildSummary) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string_pretty(summary).context("serialize build report")?;
    fs::write(&tmp, json).context("write build report")?;
    fs::rename(&tmp, path).context("swap build report")?;
    Ok(())
}

pub fn report_path(dataset_path: &Path) -> PathBuf {
    dataset_path.with_extension("report.json")
}

pub fn read_csv(path: &Path) -> Result<GameTable> {
    let mut reader =
        csv::Reader::from_path(path).with_context(|| format!("open {}", path.display()))?;
    let header = reader.headers().context("read csv header")?.clone();
    let records = reader
        .records()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("read rows of {}", path.display()))?;
    GameTable::from_records(&header, records)
}

/// Non-feature fields of a dataset row.
#[derive(Debug, Clone, PartialEq)]
pub struct GameMeta {
    pub team: String,
    pub team_opp: String,
    pub season: i32,
    pub date: NaiveDate,
    pub won: bool,
}

/// Column-oriented view used by the prediction step: metadata per row plus
/// every numeric column as a feature (missing cells are `None`).
#[derive(Debug, Clone, Default)]
pub struct GameTable {
    pub feature_names: Vec<String>,
    pub features: Vec<Vec<Option<f64>>>,
    pub games: Vec<GameMeta>,
}

impl GameTable {
    pub fn from_records<I>(header: &StringRecord, records: I) -> Result<Self>
    where
        I: IntoIterator<Item = StringRecord>,
    {
        let position = |name: &str| {
            header
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| anyhow!("dataset has no `{name}` column"))
        };
        let [team, team_opp, season, date, won] = [
            position(META_COLUMNS[0])?,
            position(META_COLUMNS[1])?,
            position(META_COLUMNS[2])?,
            position(META_COLUMNS[3])?,
            position(META_COLUMNS[4])?,
        ];

        let feature_cols = header
            .iter()
            .enumerate()
            .filter(|(idx, name)| !(*idx == 0 && name.is_empty()))
            .filter(|(_, name)| !META_COLUMNS.contains(name))
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();

        let mut table = Self {
            feature_names: feature_cols.iter().map(|i| header[*i].to_string()).collect(),
            ..Self::default()
        };

        for (line, rec) in records.into_iter().enumerate() {
            let field = |idx: usize| rec.get(idx).unwrap_or_default();
            let parsed_season = field(season)
                .trim()
                .parse::<i32>()
                .with_context(|| format!("row {line}: bad season `{}`", field(season)))?;
            let parsed_date = NaiveDate::parse_from_str(field(date).trim(), DATE_FORMAT)
                .with_context(|| format!("row {line}: bad date `{}`", field(date)))?;
            let parsed_won = parse_bool(field(won))
                .ok_or_else(|| anyhow!("row {line}: bad won flag `{}`", field(won)))?;

            table.games.push(GameMeta {
                team: field(team).to_string(),
                team_opp: field(team_opp).to_string(),
                season: parsed_season,
                date: parsed_date,
                won: parsed_won,
            });
            table.features.push(
                feature_cols
                    .iter()
                    .map(|idx| crate::box_score::coerce_numeric(field(*idx)))
                    .collect(),
            );
        }
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Stable chronological order; row positions are renumbered by the move.
    pub fn sort_by_date(&mut self) {
        let mut order = (0..self.games.len()).collect::<Vec<_>>();
        order.sort_by_key(|idx| self.games[*idx].date);
        self.games = order.iter().map(|i| self.games[*i].clone()).collect();
        self.features = order.iter().map(|i| self.features[*i].clone()).collect();
    }

    pub fn feature_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim() {
        "True" | "true" | "TRUE" | "1" => Some(true),
        "False" | "false" | "FALSE" | "0" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_date_prefix() {
        let d = parse_file_date("201601020BOS.html").expect("date");
        assert_eq!(d, NaiveDate::from_ymd_opt(2016, 1, 2).expect("valid"));
        assert!(parse_file_date("game.html").is_err());
        assert!(parse_file_date("20161340BOS.html").is_err());
    }

    #[test]
    fn bool_flags() {
        assert_eq!(parse_bool("True"), Some(true));
        assert_eq!(parse_bool("0"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn table_requires_meta_columns() {
        let header = StringRecord::from(vec!["", "pts", "team"]);
        assert!(GameTable::from_records(&header, Vec::new()).is_err());
    }

    #[test]
    fn sort_by_date_is_stable() {
        let header =
            StringRecord::from(vec!["", "pts", "team", "team_opp", "season", "date", "won"]);
        let rows = vec![
            StringRecord::from(vec!["0", "1", "B", "A", "2016", "2016-01-03", "True"]),
            StringRecord::from(vec!["1", "2", "A", "B", "2016", "2016-01-01", "False"]),
            StringRecord::from(vec!["2", "3", "C", "D", "2016", "2016-01-03", "False"]),
        ];
        let mut table = GameTable::from_records(&header, rows).expect("table");
        assert_eq!(table.feature_names, vec!["pts"]);
        table.sort_by_date();
        let teams = table.games.iter().map(|g| g.team.as_str()).collect::<Vec<_>>();
        assert_eq!(teams, vec!["A", "B", "C"]);
        assert_eq!(table.features[0], vec![Some(2.0)]);
    }
}

use std::path::PathBuf;

use crate::backtest::UnknownPolicy;

const DEFAULT_SCORES_DIR: &str = "data/scores";
const DEFAULT_DATASET: &str = "nba_games.csv";
const DEFAULT_N_FEATURES: usize = 30;
const DEFAULT_CV_SPLITS: usize = 3;
const DEFAULT_ALPHA: f64 = 1.0;
const DEFAULT_START: usize = 2;
const DEFAULT_STEP: usize = 1;
const DEFAULT_PARSE_PARALLELISM: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub scores_dir: PathBuf,
    pub dataset_path: PathBuf,
    pub n_features: usize,
    pub cv_splits: usize,
    pub alpha: f64,
    pub start: usize,
    pub step: usize,
    pub unknown_policy: UnknownPolicy,
    pub parse_parallelism: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scores_dir: PathBuf::from(DEFAULT_SCORES_DIR),
            dataset_path: PathBuf::from(DEFAULT_DATASET),
            n_features: DEFAULT_N_FEATURES,
            cv_splits: DEFAULT_CV_SPLITS,
            alpha: DEFAULT_ALPHA,
            start: DEFAULT_START,
            step: DEFAULT_STEP,
            unknown_policy: UnknownPolicy::Include,
            parse_parallelism: DEFAULT_PARSE_PARALLELISM,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then `.env.local`/`.env`, then the process environment, then
    /// command-line flags.
    pub fn load() -> Self {
        let _ = dotenvy::from_filename(".env.local");
        let _ = dotenvy::from_filename(".env");
        let args = std::env::args().skip(1).collect::<Vec<_>>();
        Self::default()
            .with_env(|key| std::env::var(key).ok())
            .with_args(&args)
    }

    pub fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(v) = get("BOXSCORE_SCORES_DIR") {
            self.scores_dir = PathBuf::from(v.trim());
        }
        if let Some(v) = get("BOXSCORE_DATASET") {
            self.dataset_path = PathBuf::from(v.trim());
        }
        if let Some(v) = get("BOXSCORE_N_FEATURES").and_then(|v| v.trim().parse().ok()) {
            self.n_features = v;
        }
        if let Some(v) = get("BOXSCORE_CV_SPLITS").and_then(|v| v.trim().parse().ok()) {
            self.cv_splits = v;
        }
        if let Some(v) = get("BOXSCORE_ALPHA").and_then(|v| v.trim().parse().ok()) {
            self.alpha = v;
        }
        if let Some(v) = get("BOXSCORE_PARSE_PARALLELISM").and_then(|v| v.trim().parse().ok()) {
            self.parse_parallelism = v;
        }
        self.clamped()
    }

    pub fn with_args(mut self, args: &[String]) -> Self {
        if let Some(v) = arg_value(args, "--scores-dir") {
            self.scores_dir = PathBuf::from(v);
        }
        if let Some(v) = arg_value(args, "--dataset") {
            self.dataset_path = PathBuf::from(v);
        }
        if let Some(v) = parsed_arg(args, "--n-features") {
            self.n_features = v;
        }
        if let Some(v) = parsed_arg(args, "--cv-splits") {
            self.cv_splits = v;
        }
        if let Some(v) = parsed_arg(args, "--alpha") {
            self.alpha = v;
        }
        if let Some(v) = parsed_arg(args, "--start") {
            self.start = v;
        }
        if let Some(v) = parsed_arg(args, "--step") {
            self.step = v;
        }
        if let Some(v) = parsed_arg(args, "--parallelism") {
            self.parse_parallelism = v;
        }
        if has_flag(args, "--exclude-unknown") {
            self.unknown_policy = UnknownPolicy::Exclude;
        }
        self.clamped()
    }

    fn clamped(mut self) -> Self {
        self.n_features = self.n_features.max(1);
        self.cv_splits = self.cv_splits.max(1);
        self.step = self.step.max(1);
        self.parse_parallelism = self.parse_parallelism.clamp(1, 32);
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            self.alpha = DEFAULT_ALPHA;
        }
        self
    }
}

fn arg_value(args: &[String], name: &str) -> Option<String> {
    for (idx, arg) in args.iter().enumerate() {
        if let Some(raw) = arg.strip_prefix(&format!("{name}=")) {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == name
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parsed_arg<T: std::str::FromStr>(args: &[String], name: &str) -> Option<T> {
    arg_value(args, name).and_then(|v| v.parse::<T>().ok())
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|arg| arg == name)
}

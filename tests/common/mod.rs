#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

/// One team's side of a synthetic box score.
pub struct TeamSide {
    pub team: String,
    pub total: u32,
    /// Points of the two players listed; totals use `total`.
    pub player_points: [u32; 2],
    pub extra_basic: bool,
    pub drop_ts: bool,
}

impl TeamSide {
    pub fn new(team: &str, total: u32) -> Self {
        Self {
            team: team.to_string(),
            total,
            player_points: [total / 2, total / 3],
            extra_basic: false,
            drop_ts: false,
        }
    }
}

pub fn box_score_html(season: i32, sides: &[TeamSide]) -> String {
    let mut html = String::from("<html><body>\n");
    html.push_str(
        r#"<table id="line_score"><thead>
<tr class="over_header"><th colspan="3">Scoring</th></tr>
<tr><th></th><th>1</th><th>T</th></tr></thead><tbody>
"#,
    );
    for side in sides {
        html.push_str(&format!(
            "<tr><th><a href=\"/teams/{t}/{season}.html\">{t}</a></th><td>{q}</td><td>{total}</td></tr>\n",
            t = side.team,
            q = side.total / 4,
            total = side.total
        ));
    }
    html.push_str("</tbody></table>\n");

    for side in sides {
        html.push_str(&basic_table(side));
        html.push_str(&advanced_table(side));
    }

    html.push_str(&format!(
        r#"<div id="bottom_nav_container">
<a href="/boxscores/">Box Scores</a>
<a href="/leagues/{season}_games.html">{season} Schedule</a>
</div>
</body></html>
"#
    ));
    html
}

fn basic_table(side: &TeamSide) -> String {
    let extra_head = if side.extra_basic { "<th>ORB</th>" } else { "" };
    let extra_cell = if side.extra_basic { "<td>3</td>" } else { "" };
    let [p1, p2] = side.player_points;
    let fg_total = side.total / 2;
    format!(
        r#"<table id="box-{t}-game-basic"><thead>
<tr class="over_header"><th colspan="5">Basic Box Score Stats</th></tr>
<tr><th>Starters</th><th>MP</th><th>FG</th><th>PTS</th><th>+/-</th>{extra_head}</tr>
</thead><tbody>
<tr><th>Player A</th><td>34:10</td><td>{fg1}</td><td>{p1}</td><td>+5</td>{extra_cell}</tr>
<tr class="thead"><th>Reserves</th><th>MP</th><th>FG</th><th>PTS</th><th>+/-</th>{extra_head}</tr>
<tr><th>Player B</th><td>20:00</td><td>{fg2}</td><td>{p2}</td><td>-2</td>{extra_cell}</tr>
<tr><th>Player C</th><td colspan="4">Did Not Play</td></tr>
</tbody><tfoot>
<tr><th>Team Totals</th><td>240</td><td>{fg_total}</td><td>{total}</td><td></td>{extra_cell}</tr>
</tfoot></table>
"#,
        t = side.team,
        fg1 = p1 / 2,
        fg2 = p2 / 2,
        total = side.total,
    )
}

fn advanced_table(side: &TeamSide) -> String {
    let (ts_head, ts1, ts2, ts_total) = if side.drop_ts {
        (String::new(), String::new(), String::new(), String::new())
    } else {
        let ts = 0.4 + f64::from(side.total % 20) / 100.0;
        (
            "<th>TS%</th>".to_string(),
            format!("<td>{:.3}</td>", ts + 0.05),
            format!("<td>{:.3}</td>", ts - 0.05),
            format!("<td>{ts:.3}</td>"),
        )
    };
    format!(
        r#"<table id="box-{t}-game-advanced"><thead>
<tr class="over_header"><th colspan="4">Advanced Box Score Stats</th></tr>
<tr><th>Starters</th><th>MP</th>{ts_head}<th>BPM</th></tr>
</thead><tbody>
<tr><th>Player A</th><td>34:10</td>{ts1}<td>4.2</td></tr>
<tr><th>Player B</th><td>20:00</td>{ts2}<td>-1.1</td></tr>
</tbody><tfoot>
<tr><th>Team Totals</th><td>240</td>{ts_total}<td></td></tr>
</tfoot></table>
"#,
        t = side.team,
    )
}

pub fn write_page(dir: &Path, name: &str, html: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, html).expect("write synthetic page");
    path
}

//! Pure HTML parsing for fixtures and standings pages.
//!
//! No browser involved: functions take the rendered DOM as a string so they
//! can be tested against static HTML. Missing or malformed rows are skipped
//! rather than failing the whole page; an empty result is valid and the
//! engine decides how loudly to report it.

use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

use fanpulse_core::{Fixture, StandingRow};

// Primary selectors target the current markup; fallbacks cover the older
// page layout still served for some competitions.
pub(crate) const FIXTURE_ROWS: [&str; 2] =
    ["li.fixture[data-match-id]", "div.fixture-item[data-match-id]"];
pub(crate) const STANDINGS_ROWS: [&str; 2] =
    ["table.standings tbody tr", "table.league-table tbody tr"];

fn selector(src: &str) -> Selector {
    // All inputs are static strings checked by the tests below.
    Selector::parse(src).expect("static selector parses")
}

fn first_text(row: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    for src in selectors {
        let sel = selector(src);
        if let Some(el) = row.select(&sel).next() {
            let text = el.text().collect::<String>().trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

/// Parse upcoming fixtures out of a rendered fixtures page.
///
/// Rows without a numeric external id or without both team names are
/// dropped. Kickoff and competition are optional.
pub fn parse_fixtures(html: &str) -> Vec<Fixture> {
    let document = Html::parse_document(html);
    let time_sel = selector("time[datetime]");

    let mut fixtures = Vec::new();
    for row_src in FIXTURE_ROWS {
        let row_sel = selector(row_src);
        for row in document.select(&row_sel) {
            let Some(external_id) = row
                .value()
                .attr("data-match-id")
                .and_then(|v| v.parse::<i64>().ok())
            else {
                debug!(
                    subsystem = "scraper",
                    component = "parse",
                    "Fixture row without usable match id, skipping"
                );
                continue;
            };

            let Some(home_team) = first_text(row, &[".team-home", ".home"]) else {
                continue;
            };
            let Some(away_team) = first_text(row, &[".team-away", ".away"]) else {
                continue;
            };

            let kickoff_at = row
                .select(&time_sel)
                .next()
                .and_then(|el| el.value().attr("datetime"))
                .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
                .map(|dt| dt.with_timezone(&Utc));

            let competition = first_text(row, &[".competition", ".league"]);

            fixtures.push(Fixture {
                external_id,
                home_team,
                away_team,
                kickoff_at,
                competition,
            });
        }
        if !fixtures.is_empty() {
            break;
        }
    }

    fixtures
}

/// Parse a league table out of a rendered standings page.
///
/// Expects rows of seven cells: position, team, played, won, drawn, lost,
/// points. Rows that do not parse numerically are skipped.
pub fn parse_standings(html: &str) -> Vec<StandingRow> {
    let document = Html::parse_document(html);
    let cell_sel = selector("td");

    let mut rows = Vec::new();
    for row_src in STANDINGS_ROWS {
        let row_sel = selector(row_src);
        for row in document.select(&row_sel) {
            let cells: Vec<String> = row
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_string())
                .collect();
            if cells.len() < 7 {
                continue;
            }

            let numbers: Option<Vec<i32>> = [0, 2, 3, 4, 5, 6]
                .iter()
                .map(|&i| cells[i].parse::<i32>().ok())
                .collect();
            let Some(n) = numbers else {
                continue;
            };
            if cells[1].is_empty() {
                continue;
            }

            rows.push(StandingRow {
                position: n[0],
                team: cells[1].clone(),
                played: n[1],
                won: n[2],
                drawn: n[3],
                lost: n[4],
                points: n[5],
            });
        }
        if !rows.is_empty() {
            break;
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURES_PAGE: &str = r#"
        <html><body><ul>
          <li class="fixture" data-match-id="9001">
            <span class="team-home">Arsenal</span>
            <span class="team-away">Chelsea</span>
            <time datetime="2026-09-12T15:00:00Z"></time>
            <span class="competition">Premier League</span>
          </li>
          <li class="fixture" data-match-id="9002">
            <span class="team-home">Liverpool</span>
            <span class="team-away">Everton</span>
          </li>
          <li class="fixture" data-match-id="not-a-number">
            <span class="team-home">Ghost</span>
            <span class="team-away">Entry</span>
          </li>
        </ul></body></html>
    "#;

    const LEGACY_FIXTURES_PAGE: &str = r#"
        <html><body>
          <div class="fixture-item" data-match-id="42">
            <span class="home">Leeds</span>
            <span class="away">Burnley</span>
          </div>
        </body></html>
    "#;

    const STANDINGS_PAGE: &str = r#"
        <html><body>
          <table class="standings"><tbody>
            <tr><td>1</td><td>Arsenal</td><td>10</td><td>8</td><td>1</td><td>1</td><td>25</td></tr>
            <tr><td>2</td><td>Liverpool</td><td>10</td><td>7</td><td>2</td><td>1</td><td>23</td></tr>
            <tr><td>-</td><td>Relegated*</td><td>x</td><td>y</td><td>z</td><td>w</td><td>v</td></tr>
          </tbody></table>
        </body></html>
    "#;

    #[test]
    fn test_parse_fixtures_skips_malformed_rows() {
        let fixtures = parse_fixtures(FIXTURES_PAGE);
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].external_id, 9001);
        assert_eq!(fixtures[0].home_team, "Arsenal");
        assert_eq!(fixtures[0].away_team, "Chelsea");
        assert_eq!(fixtures[0].competition.as_deref(), Some("Premier League"));
        assert!(fixtures[0].kickoff_at.is_some());
        assert!(fixtures[1].kickoff_at.is_none());
        assert!(fixtures[1].competition.is_none());
    }

    #[test]
    fn test_parse_fixtures_falls_back_to_legacy_markup() {
        let fixtures = parse_fixtures(LEGACY_FIXTURES_PAGE);
        assert_eq!(fixtures.len(), 1);
        assert_eq!(fixtures[0].external_id, 42);
        assert_eq!(fixtures[0].home_team, "Leeds");
    }

    #[test]
    fn test_parse_fixtures_empty_page_yields_empty_vec() {
        assert!(parse_fixtures("<html><body></body></html>").is_empty());
    }

    #[test]
    fn test_parse_standings_skips_non_numeric_rows() {
        let rows = parse_standings(STANDINGS_PAGE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[0].team, "Arsenal");
        assert_eq!(rows[0].points, 25);
        assert_eq!(rows[1].team, "Liverpool");
        assert_eq!(rows[1].drawn, 2);
    }

    #[test]
    fn test_static_selectors_parse() {
        for src in FIXTURE_ROWS.iter().chain(STANDINGS_ROWS.iter()) {
            assert!(Selector::parse(src).is_ok(), "{src}");
        }
    }
}

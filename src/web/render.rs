//! Server-side HTML for the dashboard pages

use crate::predict::{HistoryReport, UpcomingPrediction};
use std::fmt::Write;

/// Escape text for use in element content and quoted attributes
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:sans-serif;margin:2em;color:#222}\
table{border-collapse:collapse;width:100%}\
th,td{border-bottom:1px solid #ddd;padding:6px 10px;text-align:left}\
th{background:#f4f4f4}\
.correct{color:#1a7f37}.incorrect{color:#cf222e}\
.stats span{display:inline-block;margin-right:2em}";

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <nav><a href=\"/\">Upcoming</a> | <a href=\"/history\">History</a></nav>\n\
         <h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = escape(title),
    )
}

pub fn upcoming_page(predictions: &[UpcomingPrediction]) -> String {
    let mut body = String::new();
    if predictions.is_empty() {
        body.push_str("<p>No upcoming games scheduled.</p>\n");
        return layout("Upcoming NBA Predictions", &body);
    }

    body.push_str(
        "<table>\n<tr><th>Date</th><th>Matchup</th><th>Predicted Winner</th>\
         <th>Win Probability</th><th>Predicted Total</th></tr>\n",
    );
    for p in predictions {
        let when = match p.time {
            Some(t) => format!("{} {}", p.date, t.format("%H:%M")),
            None => p.date.to_string(),
        };
        let _ = writeln!(
            body,
            "<tr><td>{}</td><td>{} @ {}</td><td>{}</td><td>{:.1}%</td><td>{:.1}</td></tr>",
            escape(&when),
            escape(&p.away_team),
            escape(&p.home_team),
            escape(&p.predicted_winner),
            p.win_probability,
            p.predicted_total,
        );
    }
    body.push_str("</table>\n");
    layout("Upcoming NBA Predictions", &body)
}

pub fn history_page(report: &HistoryReport) -> String {
    let s = &report.summary;
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<p>{} to {}</p>\n<div class=\"stats\">\
         <span>Games: {}</span><span>Correct: {}</span><span>Incorrect: {}</span>\
         <span>Accuracy: {:.1}%</span><span>Avg points diff: {:.1}</span></div>",
        report.start,
        report.end,
        s.total_games,
        s.correct_predictions,
        s.incorrect_predictions,
        s.accuracy_percentage,
        s.avg_points_diff,
    );

    if report.games.is_empty() {
        body.push_str("<p>No completed games in this period.</p>\n");
        return layout("Prediction History", &body);
    }

    body.push_str(
        "<table>\n<tr><th>Date</th><th>Matchup</th><th>Score</th><th>Predicted Winner</th>\
         <th>Actual Winner</th><th>Win Probability</th><th>Predicted Total</th>\
         <th>Actual Total</th><th>Difference</th></tr>\n",
    );
    for g in &report.games {
        let class = if g.prediction_correct {
            "correct"
        } else {
            "incorrect"
        };
        let _ = writeln!(
            body,
            "<tr class=\"{}\"><td>{}</td><td>{} @ {}</td><td>{}-{}</td><td>{}</td><td>{}</td>\
             <td>{:.1}%</td><td>{:.1}</td><td>{}</td><td>{:.1}</td></tr>",
            class,
            g.date,
            escape(&g.away_team),
            escape(&g.home_team),
            g.away_score,
            g.home_score,
            escape(&g.predicted_winner),
            escape(&g.actual_winner),
            g.win_probability,
            g.predicted_total,
            g.actual_total,
            g.total_difference,
        );
    }
    body.push_str("</table>\n");
    layout("Prediction History", &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predict::{HistoryEntry, HistorySummary};
    use crate::GameId;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_escape() {
        assert_eq!(
            escape("<b>\"Tom\" & 'Jerry'</b>"),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
        assert_eq!(escape("Los Angeles Lakers"), "Los Angeles Lakers");
    }

    #[test]
    fn test_upcoming_page() {
        let page = upcoming_page(&[UpcomingPrediction {
            game_id: GameId::from("0022400062"),
            date: date("2024-10-22"),
            time: None,
            home_team: "Los Angeles Lakers".to_string(),
            away_team: "<script>".to_string(),
            predicted_winner: "Los Angeles Lakers".to_string(),
            win_probability: 61.34,
            predicted_total: 221.44,
        }]);
        assert!(page.contains("&lt;script&gt; @ Los Angeles Lakers"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("61.3%"));
        assert!(page.contains("221.4"));

        assert!(upcoming_page(&[]).contains("No upcoming games"));
    }

    #[test]
    fn test_history_page() {
        let games = vec![HistoryEntry {
            game_id: GameId::from("0022400061"),
            date: date("2024-10-22"),
            home_team: "Boston Celtics".to_string(),
            away_team: "New York Knicks".to_string(),
            home_score: 132,
            away_score: 109,
            predicted_winner: "New York Knicks".to_string(),
            actual_winner: "Boston Celtics".to_string(),
            prediction_correct: false,
            win_probability: 55.0,
            predicted_total: 220.0,
            actual_total: 241,
            total_difference: 21.0,
        }];
        let summary = HistorySummary::from_entries(&games);
        let page = history_page(&HistoryReport {
            start: date("2024-10-16"),
            end: date("2024-10-23"),
            games,
            summary,
        });
        assert!(page.contains("class=\"incorrect\""));
        assert!(page.contains("109-132"));
        assert!(page.contains("Accuracy: 0.0%"));
        assert!(page.contains("Avg points diff: 21.0"));
    }
}

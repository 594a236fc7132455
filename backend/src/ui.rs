use chrono::NaiveDate;

use crate::stats::HabitStats;
use crate::view::{TrackerGrid, TrackerView, ViewStatus};

/// Days shown in the tracker grid.
pub const GRID_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Tracker,
    Stats,
}

impl Tab {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("stats") => Tab::Stats,
            _ => Tab::Tracker,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Info(String),
    Error(String),
    /// Sign-up is waiting on email confirmation; `link` completes it.
    Confirm { message: String, link: String },
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render_notice(notice: Option<&Notice>) -> String {
    match notice {
        Some(Notice::Info(msg)) => format!(r#"<div class="notice info">{}</div>"#, escape(msg)),
        Some(Notice::Error(msg)) => format!(r#"<div class="notice error">{}</div>"#, escape(msg)),
        Some(Notice::Confirm { message, link }) => format!(
            r#"<div class="notice info">{} <a class="confirm" href="{}">Confirm email</a></div>"#,
            escape(message),
            escape(link),
        ),
        None => String::new(),
    }
}

fn layout(title: &str, body: &str) -> String {
    LAYOUT_HTML
        .replace("{{TITLE}}", &escape(title))
        .replace("{{BODY}}", body)
}

pub fn render_login(email: &str, notice: Option<&Notice>) -> String {
    let body = LOGIN_HTML
        .replace("{{NOTICE}}", &render_notice(notice))
        .replace("{{EMAIL}}", &escape(email));
    layout("Sign in - Habit Tracker", &body)
}

pub fn render_tracker(email: &str, view: &TrackerView, today: NaiveDate, tab: Tab) -> String {
    let notice = match view.status() {
        ViewStatus::Failed(msg) => Some(Notice::Error(format!("Could not load your habits. {msg}"))),
        _ => view.last_error().map(|e| Notice::Error(e.to_string())),
    };

    let content = match (view.status(), tab) {
        (ViewStatus::Ready, Tab::Tracker) => render_grid(&view.grid_at(today, GRID_DAYS)),
        (ViewStatus::Ready, Tab::Stats) => render_stats(&view.stats_at(today)),
        (ViewStatus::Loading, _) => r#"<p class="empty">Loading...</p>"#.to_string(),
        (ViewStatus::Failed(_), _) => {
            r#"<p class="empty"><a href="/">Try again</a></p>"#.to_string()
        }
    };

    let (tracker_class, stats_class) = match tab {
        Tab::Tracker => ("tab active", "tab"),
        Tab::Stats => ("tab", "tab active"),
    };

    let body = TRACKER_HTML
        .replace("{{EMAIL}}", &escape(email))
        .replace("{{NOTICE}}", &render_notice(notice.as_ref()))
        .replace("{{TRACKER_CLASS}}", tracker_class)
        .replace("{{STATS_CLASS}}", stats_class)
        .replace("{{CONTENT}}", &content);
    layout("Habit Tracker", &body)
}

fn render_grid(grid: &TrackerGrid) -> String {
    if grid.rows.is_empty() {
        return r#"<p class="empty">No habits yet. Start building your routine!</p>"#.to_string();
    }

    let header: String = grid
        .dates
        .iter()
        .map(|date| format!("<th>{}</th>", date.format("%a %-d")))
        .collect();

    let rows: String = grid
        .rows
        .iter()
        .map(|row| {
            let cells: String = row
                .cells
                .iter()
                .map(|cell| {
                    format!(
                        r#"<td><form method="post" action="/habits/{id}/toggle"><input type="hidden" name="date" value="{date}"><button class="cell{done}"{disabled} title="{date}">{mark}</button></form></td>"#,
                        id = row.habit_id,
                        date = cell.date,
                        done = if cell.done { " done" } else { "" },
                        disabled = if cell.pending { " disabled" } else { "" },
                        mark = if cell.done { "&#10003;" } else { "" },
                    )
                })
                .collect();
            format!(
                r#"<tr><td class="name">{name}</td>{cells}<td><form method="post" action="/habits/{id}/delete"><button class="delete">Delete</button></form></td></tr>"#,
                name = escape(&row.name),
                id = row.habit_id,
            )
        })
        .collect();

    format!(r#"<table><thead><tr><th>Habit</th>{header}<th></th></tr></thead><tbody>{rows}</tbody></table>"#)
}

fn render_stats(stats: &[HabitStats]) -> String {
    if stats.is_empty() {
        return r#"<p class="empty">No habits yet. Add your first habit above!</p>"#.to_string();
    }

    stats
        .iter()
        .map(|habit| {
            let windows: String = habit
                .windows
                .iter()
                .map(|w| {
                    format!(
                        r#"<div class="window"><div class="label">Last {days} Days</div><div class="percent">{pct}%</div><div class="bar"><span style="width: {pct}%"></span></div></div>"#,
                        days = w.days,
                        pct = w.percent,
                    )
                })
                .collect();
            format!(
                r#"<section class="card"><h3>{name}</h3><div class="windows">{windows}</div><form method="post" action="/habits/{id}/delete"><button class="delete">Delete</button></form></section>"#,
                name = escape(&habit.name),
                id = habit.habit_id,
            )
        })
        .collect()
}

const LAYOUT_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <meta name="viewport" content="width=device-width, initial-scale=1.0" />
  <title>{{TITLE}}</title>
  <style>
    body { margin: 0; min-height: 100vh; font-family: system-ui, sans-serif; color: #1f2937;
           background: linear-gradient(135deg, #eef2ff, #ffffff 50%, #faf5ff); }
    main { max-width: 960px; margin: 0 auto; padding: 32px 20px; }
    h1 { font-size: 2.4rem; margin: 0 0 4px; color: #4f46e5; }
    .card, table, .panel { background: #fff; border-radius: 16px; box-shadow: 0 10px 30px rgba(79, 70, 229, 0.12); }
    .panel { max-width: 420px; margin: 10vh auto; padding: 32px; }
    .notice { padding: 12px; border-radius: 10px; margin: 12px 0; }
    .notice.info { background: #ecfdf5; color: #047857; }
    .notice.error { background: #fef2f2; color: #b91c1c; }
    input[type=text], input[type=email], input[type=password] { padding: 10px 14px; border: 1px solid #d1d5db; border-radius: 10px; width: 100%; box-sizing: border-box; }
    button { padding: 10px 18px; border-radius: 10px; border: 0; background: #4f46e5; color: #fff; cursor: pointer; }
    button.secondary, button.delete { background: #fff; color: #4b5563; border: 1px solid #d1d5db; }
    button.delete { color: #dc2626; border-color: #fecaca; }
    .tabs { display: flex; gap: 8px; margin: 20px 0; }
    .tab { padding: 8px 18px; border-radius: 10px; text-decoration: none; color: #4b5563; background: #fff; }
    .tab.active { background: #4f46e5; color: #fff; }
    table { width: 100%; border-collapse: collapse; overflow: hidden; }
    th, td { padding: 10px; text-align: center; }
    td.name { text-align: left; font-weight: 600; }
    button.cell { width: 40px; height: 40px; background: #fff; border: 2px solid #d1d5db; color: #fff; }
    button.cell.done { background: #10b981; border-color: #10b981; }
    button.cell:disabled { opacity: 0.5; cursor: wait; }
    .card { padding: 24px; margin-bottom: 16px; }
    .windows { display: grid; grid-template-columns: repeat(3, 1fr); gap: 16px; }
    .percent { font-size: 2.4rem; font-weight: 800; }
    .bar { background: #e0e7ff; border-radius: 999px; height: 10px; overflow: hidden; }
    .bar span { display: block; height: 100%; background: #6366f1; }
    .empty { padding: 48px; text-align: center; color: #6b7280; }
    form.inline { display: flex; gap: 12px; }
  </style>
</head>
<body>
<main>
{{BODY}}
</main>
</body>
</html>
"#;

const LOGIN_HTML: &str = r#"<div class="panel">
  <h1>Habit Tracker</h1>
  <p>Build better habits, one day at a time</p>
  <form method="post" action="/login">
    <p><label for="email">Email Address</label><br><input id="email" type="email" name="email" value="{{EMAIL}}" required placeholder="you@example.com"></p>
    <p><label for="password">Password</label><br><input id="password" type="password" name="password" required></p>
    {{NOTICE}}
    <p><button name="action" value="sign_in">Sign In</button>
       <button class="secondary" name="action" value="sign_up">Create Account</button></p>
  </form>
</div>
"#;

const TRACKER_HTML: &str = r#"<header>
  <h1>Habit Tracker</h1>
  <p>Build better habits, one day at a time</p>
  <p>{{EMAIL}} <form method="post" action="/logout" style="display:inline"><button class="secondary">Sign Out</button></form></p>
</header>
<form class="inline" method="post" action="/habits">
  <input type="text" name="name" placeholder="What habit do you want to build?">
  <button>Add Habit</button>
</form>
{{NOTICE}}
<nav class="tabs">
  <a class="{{TRACKER_CLASS}}" href="/?view=tracker">Tracker</a>
  <a class="{{STATS_CLASS}}" href="/?view=stats">Statistics</a>
</nav>
{{CONTENT}}
"#;

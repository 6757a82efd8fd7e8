//! Standalone HTML itinerary
//!
//! All route options are embedded as JSON so the page can switch modes without
//! another request. The path is drawn into an inline SVG by projecting the
//! polyline's coordinates into its view box.

use crate::error::PlannerError;
use crate::models::{TicketInfo, TravelPlan, WeatherDay};
use std::fmt::Write;

const STYLE: &str = r#"
:root { --accent: #2f80ed; --muted: #6b7280; --card: #f5f7fb; }
* { box-sizing: border-box; }
body { margin: 0; font-family: -apple-system, "PingFang SC", "Microsoft YaHei", sans-serif; color: #1f2937; background: #fff; }
header { padding: 20px 16px 12px; background: linear-gradient(135deg, #2f80ed, #56ccf2); color: #fff; }
header h1 { margin: 0 0 6px; font-size: 20px; }
header .route { margin: 0; opacity: .9; }
section { padding: 12px 16px; }
h2 { font-size: 16px; margin: 8px 0 10px; }
.weather { display: flex; gap: 10px; overflow-x: auto; }
.card { flex: 0 0 auto; min-width: 120px; padding: 10px; border-radius: 10px; background: var(--card); }
.card .date { font-weight: 600; }
.card .temp { font-size: 18px; color: var(--accent); }
.card .advice { font-size: 12px; color: var(--muted); }
.modes { display: flex; gap: 8px; margin-bottom: 10px; }
.modes button { flex: 1; padding: 8px; border: 1px solid var(--accent); border-radius: 8px; background: #fff; color: var(--accent); font-size: 14px; }
.modes button.active { background: var(--accent); color: #fff; }
.summary { margin-bottom: 8px; color: var(--muted); font-size: 13px; }
#map { width: 100%; height: 240px; border-radius: 10px; background: var(--card); }
#map path { fill: none; stroke: var(--accent); stroke-width: 3; stroke-linejoin: round; }
#map .marker text { font-size: 11px; fill: #fff; text-anchor: middle; dominant-baseline: central; }
#steps { padding-left: 20px; }
#steps li { margin-bottom: 8px; }
#steps .meta { font-size: 12px; color: var(--muted); }
.tickets a { display: block; padding: 10px; margin-bottom: 8px; border-radius: 8px; background: var(--card); color: #1f2937; text-decoration: none; }
footer { padding: 16px; text-align: center; font-size: 12px; color: var(--muted); }
"#;

const SCRIPT: &str = r#"
(function () {
  var routes = JSON.parse(document.getElementById('route-data').textContent);
  var WIDTH = 400, HEIGHT = 240, PAD = 20;
  var SVG_NS = 'http://www.w3.org/2000/svg';

  function esc(text) {
    return String(text).replace(/[&<>"']/g, function (c) {
      return { '&': '&amp;', '<': '&lt;', '>': '&gt;', '"': '&quot;', "'": '&#39;' }[c];
    });
  }

  function points(polyline) {
    return (polyline || '').split(';').map(function (pair) {
      var parts = pair.split(',');
      return [parseFloat(parts[0]), parseFloat(parts[1])];
    }).filter(function (p) { return isFinite(p[0]) && isFinite(p[1]); });
  }

  function marker(svg, point, label, color) {
    var g = document.createElementNS(SVG_NS, 'g');
    g.setAttribute('class', 'marker');
    var circle = document.createElementNS(SVG_NS, 'circle');
    circle.setAttribute('cx', point[0]);
    circle.setAttribute('cy', point[1]);
    circle.setAttribute('r', 9);
    circle.setAttribute('fill', color);
    var text = document.createElementNS(SVG_NS, 'text');
    text.setAttribute('x', point[0]);
    text.setAttribute('y', point[1]);
    text.textContent = label;
    g.appendChild(circle);
    g.appendChild(text);
    svg.appendChild(g);
  }

  function draw(polyline) {
    var svg = document.getElementById('map');
    while (svg.firstChild) { svg.removeChild(svg.firstChild); }
    var pts = points(polyline);
    if (pts.length === 0) { return; }

    var lngs = pts.map(function (p) { return p[0]; });
    var lats = pts.map(function (p) { return p[1]; });
    var minX = Math.min.apply(null, lngs), maxX = Math.max.apply(null, lngs);
    var minY = Math.min.apply(null, lats), maxY = Math.max.apply(null, lats);
    var span = Math.max(maxX - minX, maxY - minY) || 1;
    var scale = Math.min(WIDTH, HEIGHT) - 2 * PAD;
    var offX = (WIDTH - (maxX - minX) / span * scale) / 2;
    var offY = (HEIGHT - (maxY - minY) / span * scale) / 2;

    var projected = pts.map(function (p) {
      return [offX + (p[0] - minX) / span * scale, HEIGHT - offY - (p[1] - minY) / span * scale];
    });

    var path = document.createElementNS(SVG_NS, 'path');
    path.setAttribute('d', projected.map(function (p, i) {
      return (i === 0 ? 'M' : 'L') + p[0].toFixed(1) + ' ' + p[1].toFixed(1);
    }).join(' '));
    svg.appendChild(path);
    marker(svg, projected[0], '起', '#27ae60');
    marker(svg, projected[projected.length - 1], '终', '#eb5757');
  }

  function renderSteps(option) {
    var summary = '📏 ' + esc(option.distance_km) + 'km | ⏳ ' + option.duration_min + 'min';
    if (option.cost) { summary += ' | 💰 ' + esc(option.cost); }
    document.getElementById('summary').innerHTML = summary;
    document.getElementById('steps').innerHTML = option.steps.map(function (step) {
      return '<li>' + esc(step.instruction) +
        '<div class="meta">' + step.distance + 'm | ' + step.duration + 'min</div></li>';
    }).join('');
  }

  function select(mode) {
    var option = routes[mode];
    if (!option) { return; }
    document.querySelectorAll('.modes button').forEach(function (button) {
      button.classList.toggle('active', button.getAttribute('data-mode') === mode);
    });
    draw(option.polyline);
    renderSteps(option);
  }

  document.querySelectorAll('.modes button').forEach(function (button) {
    button.addEventListener('click', function () { select(button.getAttribute('data-mode')); });
  });
  var first = document.querySelector('.modes button');
  if (first) { select(first.getAttribute('data-mode')); }
})();
"#;

/// Render a plan as a self-contained HTML page
pub fn render_html(plan: &TravelPlan) -> Result<String, PlannerError> {
    let routes = serde_json::to_string(&plan.route_options)
        .map_err(|e| PlannerError::render(format!("Failed to encode route options: {e}")))?
        .replace('<', "\\u003c");

    let mut html = String::with_capacity(STYLE.len() + SCRIPT.len() + routes.len() + 4096);
    html.push_str("<!DOCTYPE html>\n<html lang=\"zh-CN\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    let _ = writeln!(html, "<title>{}</title>", escape_html(&plan.title()));
    let _ = writeln!(html, "<style>{STYLE}</style>\n</head>\n<body>");

    let _ = writeln!(
        html,
        "<header><h1>🌍 {} 智能出行行程单</h1><p class=\"route\">{} ➔ {}</p></header>",
        escape_html(&plan.city),
        escape_html(&plan.origin),
        escape_html(&plan.destination)
    );

    if !plan.weather_list.is_empty() {
        html.push_str("<section><h2>🌤️ 天气看板</h2><div class=\"weather\">\n");
        for day in &plan.weather_list {
            write_weather_card(&mut html, day);
        }
        html.push_str("</div></section>\n");
    }

    html.push_str("<section><h2>🗺️ 出行方案</h2><div class=\"modes\">");
    for mode in plan.route_options.keys() {
        let _ = write!(
            html,
            "<button type=\"button\" data-mode=\"{}\">{} {}</button>",
            mode.key(),
            mode.icon(),
            mode.label()
        );
    }
    html.push_str("</div>\n<div class=\"summary\" id=\"summary\"></div>\n");
    html.push_str("<svg id=\"map\" viewBox=\"0 0 400 240\" preserveAspectRatio=\"xMidYMid meet\"></svg>\n");
    html.push_str("<ol id=\"steps\"></ol></section>\n");

    if !plan.tickets.is_empty() {
        html.push_str("<section class=\"tickets\"><h2>🎫 票务预约通道</h2>\n");
        for ticket in &plan.tickets {
            write_ticket_link(&mut html, ticket);
        }
        html.push_str("</section>\n");
    }

    let _ = writeln!(
        html,
        "<footer>Generated by TripPlan @ {}</footer>",
        escape_html(&plan.city)
    );
    let _ = writeln!(
        html,
        "<script type=\"application/json\" id=\"route-data\">{routes}</script>"
    );
    let _ = write!(html, "<script>{SCRIPT}</script>\n</body>\n</html>\n");

    Ok(html)
}

fn write_weather_card(html: &mut String, day: &WeatherDay) {
    let _ = write!(
        html,
        "<div class=\"card\"><div class=\"date\">{}</div><div>{}</div><div class=\"temp\">{}</div>",
        escape_html(&day.date),
        escape_html(&day.condition),
        escape_html(&day.format_temperature())
    );
    if !day.dressing_advice.is_empty() {
        let _ = write!(
            html,
            "<div class=\"advice\">👕 {}</div>",
            escape_html(&day.dressing_advice)
        );
    }
    if !day.uv_advice.is_empty() {
        let _ = write!(html, "<div class=\"advice\">☀️ {}</div>", escape_html(&day.uv_advice));
    }
    html.push_str("</div>\n");
}

fn write_ticket_link(html: &mut String, ticket: &TicketInfo) {
    let href = if ticket.url.starts_with("https://") || ticket.url.starts_with("http://") {
        escape_html(&ticket.url)
    } else {
        "#".to_string()
    };
    let _ = writeln!(
        html,
        "<a href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\">🎫 {} · 点击快速预约</a>",
        escape_html(&ticket.name)
    );
}

/// Escape text for use in element content and quoted attributes
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

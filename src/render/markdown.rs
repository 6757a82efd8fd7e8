use super::glyph::{step_glyph, visual_bar};
use crate::models::{TravelOption, TravelPlan};
use std::fmt::Write;

/// Render a plan as a Markdown itinerary
#[must_use]
pub fn render_markdown(plan: &TravelPlan) -> String {
    let mut md = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(md, "# 🌍 {} 智能出行行程单\n", plan.city);
    let _ = writeln!(md, "> **路线**: {} ➔ {}\n", plan.origin, plan.destination);

    if !plan.weather_list.is_empty() {
        md.push_str("## 🌤️ 天气看板\n\n");
        md.push_str("| 日期 | 天气 | 温度 | 穿衣建议 |\n");
        md.push_str("| --- | --- | --- | --- |\n");
        for day in &plan.weather_list {
            let _ = writeln!(
                md,
                "| {} | **{}** | {}°/{}° | {} |",
                day.date,
                day.condition,
                day.temp_min,
                day.temp_max,
                table_cell(&day.dressing_advice)
            );
        }
        md.push('\n');
    }

    md.push_str("## 🗺️ 出行方案\n\n");
    for option in plan.route_options.values() {
        write_option(&mut md, option);
    }

    if !plan.tickets.is_empty() {
        md.push_str("## 🎫 票务预约通道\n\n");
        for ticket in &plan.tickets {
            let _ = writeln!(
                md,
                "- [ ] **{}** [点击快速预约]({})",
                escape_inline(&ticket.name),
                link_destination(&ticket.url)
            );
        }
        md.push('\n');
    }

    let _ = write!(md, "---\n*Generated by TripPlan @ {}*\n", plan.city);
    md
}

/// Backslash-escape characters that would end emphasis or start a link
fn escape_inline(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '`' | '[' | ']' | '(' | ')' | '<' | '>') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Percent-encode characters that would end a link destination early
fn link_destination(url: &str) -> String {
    let mut encoded = String::with_capacity(url.len());
    for c in url.trim().chars() {
        match c {
            '(' => encoded.push_str("%28"),
            ')' => encoded.push_str("%29"),
            ' ' => encoded.push_str("%20"),
            '<' => encoded.push_str("%3C"),
            '>' => encoded.push_str("%3E"),
            _ => encoded.push(c),
        }
    }
    encoded
}

fn write_option(md: &mut String, option: &TravelOption) {
    let _ = writeln!(md, "### {} {}方案\n", option.mode.icon(), option.mode.label());
    md.push_str("**全程进度 (比例化折线):**\n\n");
    let _ = writeln!(md, "```text\n{}\n```\n", visual_bar(&option.steps));
    let _ = write!(
        md,
        "> 📏 **总里程**: {}km | ⏳ **预计耗时**: {}min",
        option.distance_km, option.duration_min
    );
    if !option.cost.is_empty() {
        let _ = write!(md, " | 💰 **费用**: {}", option.cost);
    }
    md.push_str("\n\n---\n\n");

    md.push_str("**📋 详细环节拆解:**\n\n");
    for step in option.steps.iter().filter(|s| s.distance_meters > 0) {
        let _ = writeln!(
            md,
            "- **{}** {}\n  - *路段长 {}m | 预计耗时 {}min*",
            step_glyph(&step.instruction),
            step.instruction,
            step.distance_meters,
            step.duration_min
        );
    }
    md.push('\n');
}

fn table_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::tests::sample_plan;

    #[test]
    fn test_sections_in_order() {
        let md = render_markdown(&sample_plan());

        let positions: Vec<usize> = [
            "# 🌍 上海 智能出行行程单",
            "> **路线**: 虹桥火车站 ➔ 外滩",
            "## 🌤️ 天气看板",
            "### 🚗 自驾方案",
            "### 🚇 公交方案",
            "## 🎫 票务预约通道",
            "*Generated by TripPlan @ 上海*",
        ]
        .iter()
        .map(|needle| md.find(needle).unwrap_or_else(|| panic!("missing {needle}")))
        .collect();

        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_weather_and_ticket_rows() {
        let md = render_markdown(&sample_plan());
        assert!(md.contains("| 今天 | **多云** | 12°/20° | 较舒适 |"));
        assert!(md.contains("- [ ] **东方明珠** [点击快速预约](https://m.ctrip.com/sight/1.html)"));
    }

    #[test]
    fn test_ticket_link_survives_brackets() {
        let mut plan = sample_plan();
        plan.tickets[0].name = "外滩[夜景](特惠)".to_string();
        plan.tickets[0].url = "https://m.ctrip.com/sight/shanghai(2).html?a=1 b".to_string();

        let md = render_markdown(&plan);
        assert!(md.contains(
            "- [ ] **外滩\\[夜景\\]\\(特惠\\)** [点击快速预约](https://m.ctrip.com/sight/shanghai%282%29.html?a=1%20b)"
        ));
    }

    #[test]
    fn test_breakdown_skips_zero_distance_steps() {
        let md = render_markdown(&sample_plan());
        assert!(md.contains("- **↩️** 左转进入延安高架\n  - *路段长 8000m | 预计耗时 12min*"));
        assert!(!md.contains("原地等待"));
        assert!(md.contains("> 📏 **总里程**: 12.0km | ⏳ **预计耗时**: 25min"));
    }

    #[test]
    fn test_empty_weather_and_tickets_are_omitted() {
        let mut plan = sample_plan();
        plan.weather_list.clear();
        plan.tickets.clear();

        let md = render_markdown(&plan);
        assert!(!md.contains("天气看板"));
        assert!(!md.contains("票务预约通道"));
        assert!(md.contains("### 🚗 自驾方案"));
        assert!(md.ends_with("*Generated by TripPlan @ 上海*\n"));
    }

    #[test]
    fn test_bar_is_fenced() {
        let md = render_markdown(&sample_plan());
        assert!(md.contains("```text\n📍"));
        assert!(md.contains("─🏁\n```"));
    }
}

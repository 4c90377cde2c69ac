//! Usage reports over the per-day buckets

use chrono::{Datelike, Duration, Months, NaiveDate};
use focusguard_api::{
    DayStats, DomainUsage, ReportOverview, ReportRow, ReportView, UsageReport, UsageStats,
};
use focusguard_util::{DayKey, Domain, FocusError, Result};
use std::collections::BTreeMap;

const DAILY_ROWS: i64 = 30;
const WEEKLY_ROWS: i64 = 12;
const MONTHLY_ROWS: u32 = 12;
const MAX_STREAK_DAYS: u32 = 365;
const TOP_DOMAINS: usize = 5;

/// Build the report for `view`, ending with the period that contains `today`
pub fn build_report(stats: &UsageStats, view: ReportView, today: NaiveDate) -> UsageReport {
    let rows = match view {
        ReportView::Daily => daily_rows(stats, today),
        ReportView::Weekly => weekly_rows(stats, today),
        ReportView::Monthly => monthly_rows(stats, today),
    };

    UsageReport {
        view,
        overview: overview(stats, &rows, today),
        top_domains: top_domains(stats, &rows, TOP_DOMAINS),
        rows,
    }
}

fn day<'a>(stats: &'a UsageStats, date: NaiveDate) -> Option<&'a DayStats> {
    stats.get(&DayKey::from_date(date))
}

fn sum_range(stats: &UsageStats, label: String, start: NaiveDate, end: NaiveDate) -> ReportRow {
    let mut row = ReportRow {
        label,
        start,
        end,
        time_spent: 0,
        blocks: 0,
        visits: 0,
    };

    for date in start.iter_days().take_while(|d| *d <= end) {
        if let Some(day) = day(stats, date) {
            row.time_spent += day.time_spent;
            row.blocks += day.blocks;
            row.visits += day.visits;
        }
    }
    row
}

fn daily_rows(stats: &UsageStats, today: NaiveDate) -> Vec<ReportRow> {
    (0..DAILY_ROWS)
        .rev()
        .map(|back| {
            let date = today - Duration::days(back);
            sum_range(stats, date.format("%b %-d").to_string(), date, date)
        })
        .collect()
}

/// Weeks start on Sunday
fn weekly_rows(stats: &UsageStats, today: NaiveDate) -> Vec<ReportRow> {
    let this_week = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));

    (0..WEEKLY_ROWS)
        .rev()
        .map(|back| {
            let start = this_week - Duration::weeks(back);
            let end = start + Duration::days(6);
            sum_range(stats, format!("Week {}", WEEKLY_ROWS - back), start, end)
        })
        .collect()
}

fn monthly_rows(stats: &UsageStats, today: NaiveDate) -> Vec<ReportRow> {
    let this_month = today.with_day(1).unwrap_or(today);

    (0..MONTHLY_ROWS)
        .rev()
        .filter_map(|back| {
            let start = this_month.checked_sub_months(Months::new(back))?;
            let end = start.checked_add_months(Months::new(1))?.pred_opt()?;
            Some(sum_range(stats, start.format("%b %Y").to_string(), start, end))
        })
        .collect()
}

/// Totals over the span covered by `rows`, plus the current streak.
/// The daily average counts only days with activity, whatever the view.
pub fn overview(stats: &UsageStats, rows: &[ReportRow], today: NaiveDate) -> ReportOverview {
    let total_time_spent: u64 = rows.iter().map(|r| r.time_spent).sum();
    let total_blocks: u64 = rows.iter().map(|r| r.blocks).sum();

    let active_days = match (rows.first(), rows.last()) {
        (Some(first), Some(last)) => stats
            .range(DayKey::from_date(first.start)..=DayKey::from_date(last.end))
            .filter(|(_, day)| day.has_activity())
            .count() as u64,
        _ => 0,
    };
    let average_daily_minutes = if active_days == 0 {
        0
    } else {
        (total_time_spent + active_days / 2) / active_days
    };

    ReportOverview {
        total_time_spent,
        total_blocks,
        average_daily_minutes,
        streak_days: streak(stats, today),
    }
}

/// Consecutive days with activity, ending today
pub fn streak(stats: &UsageStats, today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut date = today;

    while count < MAX_STREAK_DAYS {
        match day(stats, date) {
            Some(d) if d.has_activity() => count += 1,
            _ => break,
        }
        match date.pred_opt() {
            Some(prev) => date = prev,
            None => break,
        }
    }
    count
}

/// Domains with the most minutes over the span covered by `rows`
pub fn top_domains(stats: &UsageStats, rows: &[ReportRow], limit: usize) -> Vec<DomainUsage> {
    let (Some(first), Some(last)) = (rows.first(), rows.last()) else {
        return Vec::new();
    };
    let (from, to) = (DayKey::from_date(first.start), DayKey::from_date(last.end));

    let mut totals: BTreeMap<&Domain, u64> = BTreeMap::new();
    for (_, day) in stats.range(from..=to) {
        for (domain, minutes) in &day.domain_usage {
            *totals.entry(domain).or_insert(0) += minutes;
        }
    }

    let mut ranked: Vec<DomainUsage> = totals
        .into_iter()
        .filter(|(_, minutes)| *minutes > 0)
        .map(|(domain, minutes)| DomainUsage {
            domain: domain.clone(),
            minutes,
        })
        .collect();
    ranked.sort_by(|a, b| b.minutes.cmp(&a.minutes).then_with(|| a.domain.cmp(&b.domain)));
    ranked.truncate(limit);
    ranked
}

/// All buckets as pretty-printed JSON
pub fn export_json(stats: &UsageStats) -> Result<String> {
    serde_json::to_string_pretty(stats)
        .map_err(|e| FocusError::internal(format!("failed to serialize usage: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn with_day(stats: &mut UsageStats, date: NaiveDate, time_spent: u64, blocks: u64) {
        let day = stats.entry(DayKey::from_date(date)).or_default();
        day.time_spent = time_spent;
        day.blocks = blocks;
        day.visits = 1;
    }

    #[test]
    fn daily_covers_thirty_days_ending_today() {
        let mut stats = UsageStats::new();
        let today = date(2025, 3, 10);
        with_day(&mut stats, today, 20, 2);
        with_day(&mut stats, date(2025, 1, 1), 99, 9);

        let report = build_report(&stats, ReportView::Daily, today);
        assert_eq!(report.rows.len(), 30);
        assert_eq!(report.rows[0].start, date(2025, 2, 9));
        assert_eq!(report.rows[29].label, "Mar 10");
        assert_eq!(report.rows[29].time_spent, 20);
        assert_eq!(report.overview.total_time_spent, 20);
    }

    #[test]
    fn weekly_rows_start_on_sunday() {
        let mut stats = UsageStats::new();
        // 2025-03-12 is a Wednesday
        let today = date(2025, 3, 12);
        with_day(&mut stats, date(2025, 3, 9), 10, 1);
        with_day(&mut stats, date(2025, 3, 12), 5, 1);
        with_day(&mut stats, date(2025, 3, 8), 7, 0);

        let report = build_report(&stats, ReportView::Weekly, today);
        assert_eq!(report.rows.len(), 12);

        let current = &report.rows[11];
        assert_eq!(current.label, "Week 12");
        assert_eq!(current.start, date(2025, 3, 9));
        assert_eq!(current.end, date(2025, 3, 15));
        assert_eq!(current.time_spent, 15);
        assert_eq!(report.rows[10].time_spent, 7);
    }

    #[test]
    fn monthly_rows_span_calendar_months() {
        let mut stats = UsageStats::new();
        let today = date(2025, 3, 10);
        with_day(&mut stats, date(2025, 2, 28), 30, 3);
        with_day(&mut stats, date(2024, 4, 1), 12, 0);

        let report = build_report(&stats, ReportView::Monthly, today);
        assert_eq!(report.rows.len(), 12);
        assert_eq!(report.rows[0].label, "Apr 2024");
        assert_eq!(report.rows[0].time_spent, 12);
        assert_eq!(report.rows[10].end, date(2025, 2, 28));
        assert_eq!(report.rows[10].time_spent, 30);
        assert_eq!(report.rows[11].label, "Mar 2025");
    }

    #[test]
    fn average_counts_only_active_rows() {
        let mut stats = UsageStats::new();
        let today = date(2025, 3, 10);
        with_day(&mut stats, date(2025, 3, 9), 10, 0);
        with_day(&mut stats, today, 25, 0);

        let report = build_report(&stats, ReportView::Daily, today);
        assert_eq!(report.overview.average_daily_minutes, 18);
        assert_eq!(report.overview.total_blocks, 0);
    }

    #[test]
    fn weekly_average_is_per_active_day() {
        let mut stats = UsageStats::new();
        let today = date(2025, 3, 12);
        // Three active days inside the current week, one quiet day
        with_day(&mut stats, date(2025, 3, 9), 30, 0);
        with_day(&mut stats, date(2025, 3, 10), 0, 0);
        with_day(&mut stats, date(2025, 3, 11), 20, 1);
        with_day(&mut stats, today, 10, 0);

        let report = build_report(&stats, ReportView::Weekly, today);
        assert_eq!(report.overview.total_time_spent, 60);
        assert_eq!(report.overview.average_daily_minutes, 20);

        let report = build_report(&stats, ReportView::Monthly, today);
        assert_eq!(report.overview.average_daily_minutes, 20);
    }

    #[test]
    fn streak_stops_at_first_quiet_day() {
        let mut stats = UsageStats::new();
        let today = date(2025, 3, 10);
        with_day(&mut stats, today, 0, 1);
        with_day(&mut stats, date(2025, 3, 9), 5, 0);
        with_day(&mut stats, date(2025, 3, 7), 5, 0);

        assert_eq!(streak(&stats, today), 2);
        assert_eq!(streak(&stats, date(2025, 3, 11)), 0);
    }

    #[test]
    fn top_domains_ranked_by_minutes() {
        let mut stats = UsageStats::new();
        let today = date(2025, 3, 10);
        let day = stats.entry(DayKey::from_date(today)).or_default();
        day.domain_usage.insert(Domain::new("reddit.com"), 12);
        day.domain_usage.insert(Domain::new("youtube.com"), 40);
        day.domain_usage.insert(Domain::new("x.com"), 0);

        let report = build_report(&stats, ReportView::Daily, today);
        let names: Vec<&str> = report.top_domains.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(names, vec!["youtube.com", "reddit.com"]);
    }

    #[test]
    fn export_is_pretty_json() {
        let mut stats = UsageStats::new();
        with_day(&mut stats, date(2025, 3, 10), 3, 1);

        let json = export_json(&stats).unwrap();
        assert!(json.contains("\n  \"2025-03-10\": {"));
        assert!(json.contains("\"timeSpent\": 3"));
    }
}

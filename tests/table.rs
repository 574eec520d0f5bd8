use report_etl::table::render_table;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn render_table_right_aligns_numeric_columns() {
    let headers = strings(&["channel", "alerts"]);
    let rows = vec![strings(&["ATM", "1,200"]), strings(&["Internet", "7"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(
        lines,
        vec![
            "channel   alerts",
            "--------  ------",
            "ATM        1,200",
            "Internet       7",
        ]
    );
}

#[test]
fn render_table_flattens_control_characters() {
    let headers = strings(&["note"]);
    let rows = vec![strings(&["line1\nline2\tvalue"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[2], "line1 line2 value");
}

#[test]
fn render_table_ignores_ansi_sequences_in_width() {
    let headers = strings(&["résumé", "status"]);
    let rows = vec![strings(&["café", "\u{1b}[31mERR\u{1b}[0m"])];

    let rendered = render_table(&headers, &rows);
    let lines: Vec<&str> = rendered.lines().collect();

    assert_eq!(lines[0], "résumé  status");
    assert_eq!(lines[2], "café    \u{1b}[31mERR\u{1b}[0m");
}

#[test]
fn render_table_pads_short_rows() {
    let headers = strings(&["a", "b"]);
    let rows = vec![strings(&["x"])];
    let rendered = render_table(&headers, &rows);
    assert_eq!(rendered.lines().nth(2), Some("x"));
}

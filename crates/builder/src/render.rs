//! Status-frame rendering
//!
//! Turns engine events into the one-line-per-event text format collected in
//! the build log: `v:` build-graph vertexes, `s:` progress counters, `l:`
//! captured output.

use chrono::{SecondsFormat, Utc};

use crate::engine::{StatusFrame, Vertex, VertexLog, VertexStatus};

/// Render every event in a frame, in vertex/status/log order.
pub fn render_frame(frame: &StatusFrame) -> Vec<String> {
    let mut lines = Vec::new();
    for vertex in &frame.vertexes {
        lines.push(render_vertex(vertex));
    }
    for status in &frame.statuses {
        lines.push(render_status(status));
    }
    for log in &frame.logs {
        lines.push(render_log(log));
    }
    lines
}

fn render_vertex(vertex: &Vertex) -> String {
    let started = vertex.started.unwrap_or_else(Utc::now);
    let started_str = started.to_rfc3339_opts(SecondsFormat::Secs, true);

    match vertex.completed {
        Some(completed) => {
            let elapsed = (completed - started).num_milliseconds() as f64 / 1000.0;
            format!("v: {} {} {:.2}s", started_str, vertex.name, elapsed)
        }
        None => format!("v: {} {}", started_str, vertex.name),
    }
}

fn render_status(status: &VertexStatus) -> String {
    format!(
        "s: {} {} {}",
        status.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        status.id,
        status.current
    )
}

fn render_log(log: &VertexLog) -> String {
    format!(
        "l: {} {}",
        log.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        log.data.trim_end_matches('\n')
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_completed_vertex_has_duration() {
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let vertex = Vertex {
            name: "[2/3] COPY . .".into(),
            started: Some(started),
            completed: Some(started + chrono::Duration::milliseconds(1500)),
        };

        assert_eq!(
            render_vertex(&vertex),
            "v: 2024-05-01T12:00:00Z [2/3] COPY . . 1.50s"
        );
    }

    #[test]
    fn test_running_vertex_has_no_duration() {
        let started = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let vertex = Vertex {
            name: "[1/3] FROM scratch".into(),
            started: Some(started),
            completed: None,
        };

        assert_eq!(
            render_vertex(&vertex),
            "v: 2024-05-01T12:00:00Z [1/3] FROM scratch"
        );
    }

    #[test]
    fn test_unstarted_vertex_falls_back_to_now() {
        let vertex = Vertex {
            name: "pending".into(),
            started: None,
            completed: None,
        };

        let line = render_vertex(&vertex);
        assert!(line.starts_with("v: "));
        assert!(line.ends_with(" pending"));
    }

    #[test]
    fn test_status_line() {
        let status = VertexStatus {
            id: "sha256:ab12".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 2).unwrap(),
            current: 4096,
        };

        assert_eq!(
            render_status(&status),
            "s: 2024-05-01T12:00:02Z sha256:ab12 4096"
        );
    }

    #[test]
    fn test_log_line_trims_trailing_newline() {
        let log = VertexLog {
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 3).unwrap(),
            data: "Step complete\n".into(),
        };

        assert_eq!(render_log(&log), "l: 2024-05-01T12:00:03Z Step complete");
    }

    #[test]
    fn test_frame_order_is_vertexes_statuses_logs() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let frame = StatusFrame {
            vertexes: vec![Vertex {
                name: "v1".into(),
                started: Some(ts),
                completed: None,
            }],
            statuses: vec![VertexStatus {
                id: "s1".into(),
                timestamp: ts,
                current: 1,
            }],
            logs: vec![VertexLog {
                timestamp: ts,
                data: "l1".into(),
            }],
            error: None,
        };

        let lines = render_frame(&frame);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("v: "));
        assert!(lines[1].starts_with("s: "));
        assert!(lines[2].starts_with("l: "));
    }
}

// src/views/posts.rs - post list as an HTML fragment
use std::fmt::Display;

use chrono::{DateTime, Datelike, FixedOffset, Utc};
use log::error;

use crate::models::post::Post;
use crate::views::escape::escape_html;

pub const BODY_PREVIEW_CHARS: usize = 120;
pub const LOADING_HTML: &str = "<p>読み込み中...</p>";
pub const LOAD_ERROR_HTML: &str = "<p>読み込みエラーが発生しました。</p>";
pub const EMPTY_HTML: &str = "<p>まだ投稿がありません。</p>";

/// Renders the result of a posts fetch: a fixed message on error or when empty,
/// otherwise one card per row in the order given.
pub fn render_posts<E: Display>(result: Result<Vec<Post>, E>, offset: &FixedOffset) -> String {
    match result {
        Err(e) => {
            error!("Failed to load posts: {}", e);
            LOAD_ERROR_HTML.to_string()
        }
        Ok(posts) if posts.is_empty() => EMPTY_HTML.to_string(),
        Ok(posts) => posts.iter().map(|p| render_card(p, offset)).collect(),
    }
}

pub fn render_card(post: &Post, offset: &FixedOffset) -> String {
    let image = match post.image_url.as_deref() {
        Some(url) if !url.is_empty() => {
            format!(r#"<img src="{}" alt="投稿画像">"#, escape_html(url))
        }
        _ => String::new(),
    };

    format!(
        r#"
    <article class="post-card">
      {image}
      <div class="inner">
        <h4>{title}</h4>
        <time datetime="{iso}">{date}</time>
        <p>{body}</p>
      </div>
    </article>
  "#,
        image = image,
        title = escape_html(&post.title),
        iso = post.created_at.to_rfc3339(),
        date = short_date(&post.created_at, offset),
        body = escape_html(truncate_chars(&post.body, BODY_PREVIEW_CHARS)),
    )
}

/// Japanese short date, e.g. `2024年3月5日`, in the given display offset.
pub fn short_date(at: &DateTime<Utc>, offset: &FixedOffset) -> String {
    let local = at.with_timezone(offset);
    format!("{}年{}月{}日", local.year(), local.month(), local.day())
}

/// Prefix of at most `max` characters (not bytes).
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn post(title: &str, body: &str, hour: u32) -> Post {
        Post {
            title: title.to_string(),
            body: body.to_string(),
            image_url: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, hour, 0, 0).unwrap(),
        }
    }

    #[test]
    fn error_renders_fixed_message_only() {
        let html = render_posts::<&str>(Err("boom"), &jst());
        assert_eq!(html, LOAD_ERROR_HTML);
        assert!(!html.contains("post-card"));
    }

    #[test]
    fn empty_renders_placeholder() {
        assert_eq!(render_posts::<&str>(Ok(vec![]), &jst()), EMPTY_HTML);
    }

    #[test]
    fn card_escapes_title_and_body() {
        let html = render_card(&post("Hello <b>", r#"a & "b" 'c'"#, 0), &jst());
        assert!(html.contains("<h4>Hello &lt;b&gt;</h4>"));
        assert!(html.contains("<p>a &amp; &quot;b&quot; &#39;c&#39;</p>"));
        assert!(!html.contains("<b>"));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn card_truncates_long_body_to_120_chars() {
        let body = "あ".repeat(130);
        let html = render_card(&post("t", &body, 0), &jst());
        let expected = format!("<p>{}</p>", "あ".repeat(120));
        assert!(html.contains(&expected));
        assert!(!html.contains(&"あ".repeat(121)));
    }

    #[test]
    fn truncation_happens_before_escaping() {
        let body = format!("{}<tail", "x".repeat(119));
        let html = render_card(&post("t", &body, 0), &jst());
        assert!(html.contains(&format!("<p>{}&lt;</p>", "x".repeat(119))));
    }

    #[test]
    fn card_shows_image_when_present() {
        let mut p = post("t", "", 0);
        p.image_url = Some("https://cdn.test/a.png?x=1&y=2".to_string());
        let html = render_card(&p, &jst());
        assert!(html.contains(r#"<img src="https://cdn.test/a.png?x=1&amp;y=2" alt="投稿画像">"#));
    }

    #[test]
    fn date_uses_display_offset() {
        // 20:00 UTC on the 5th is already the 6th in JST
        let p = post("t", "", 20);
        assert_eq!(short_date(&p.created_at, &jst()), "2024年3月6日");
        let utc = FixedOffset::east_opt(0).unwrap();
        assert_eq!(short_date(&p.created_at, &utc), "2024年3月5日");
    }

    #[test]
    fn cards_keep_received_order() {
        let rows = vec![post("third", "", 3), post("second", "", 2), post("first", "", 1)];
        let html = render_posts::<&str>(Ok(rows), &jst());
        let third = html.find("third").unwrap();
        let second = html.find("second").unwrap();
        let first = html.find("first").unwrap();
        assert!(third < second && second < first);
        assert_eq!(html.matches("post-card").count(), 3);
    }

    #[test]
    fn truncate_chars_short_input_is_unchanged() {
        assert_eq!(truncate_chars("abc", 120), "abc");
        assert_eq!(truncate_chars("", 120), "");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}

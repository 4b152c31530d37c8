use crate::views::posts::{LOADING_HTML, LOAD_ERROR_HTML};

const PAGE_TOP: &str = r#"<!DOCTYPE html>
<html lang="ja">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>ブログ投稿</title>
  <style>
    body { font-family: sans-serif; max-width: 720px; margin: 2rem auto; padding: 0 1rem; }
    form { display: grid; gap: .5rem; margin-bottom: 2rem; }
    .post-card { border: 1px solid #ddd; border-radius: 8px; margin-bottom: 1rem; overflow: hidden; }
    .post-card img { width: 100%; max-height: 320px; object-fit: cover; }
    .post-card .inner { padding: .75rem 1rem; }
    .post-card time { color: #777; font-size: .85rem; }
  </style>
</head>
<body>
  <form id="postForm" action="/posts" method="post" enctype="multipart/form-data">
    <input id="title" name="title" type="text" placeholder="タイトル" required>
    <textarea id="body" name="body" rows="4" placeholder="本文"></textarea>
    <input id="imageFile" name="imageFile" type="file" accept="image/*">
    <button type="submit">投稿</button>
  </form>
  <section id="posts">"#;

const PAGE_BOTTOM: &str = r#"
  <script>
    const postForm = document.getElementById("postForm");
    const postsWrap = document.getElementById("posts");

    async function fetchPosts() {
      postsWrap.innerHTML = LOADING_HTML;
      try {
        const res = await fetch("/posts");
        postsWrap.innerHTML = await res.text();
      } catch (err) {
        console.error(err);
        postsWrap.innerHTML = LOAD_ERROR_HTML;
      }
    }

    postForm.addEventListener("submit", async (e) => {
      e.preventDefault();
      if (!document.getElementById("title").value.trim()) {
        alert("タイトルは必須です");
        return;
      }
      try {
        const res = await fetch("/posts", { method: "POST", body: new FormData(postForm) });
        const json = await res.json();
        if (!res.ok) throw new Error(json.message);
        postForm.reset();
        await fetchPosts();
      } catch (err) {
        alert(err.message || err);
        console.error(err);
      }
    });
  </script>
</body>
</html>
"#;

/// Full page: the post form plus an already rendered posts fragment.
pub fn render_page(posts_html: &str) -> String {
    let script_consts = format!(
        "</section>\n  <script>const LOADING_HTML = {:?}; const LOAD_ERROR_HTML = {:?};</script>",
        LOADING_HTML, LOAD_ERROR_HTML
    );
    let mut page = String::with_capacity(PAGE_TOP.len() + posts_html.len() + PAGE_BOTTOM.len() + 128);
    page.push_str(PAGE_TOP);
    page.push_str(posts_html);
    page.push_str(&script_consts);
    page.push_str(PAGE_BOTTOM);
    page
}

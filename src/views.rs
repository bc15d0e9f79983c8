use axum::response::Html;

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, logged_in: bool, flash: Option<&str>, body: &str) -> Html<String> {
    let nav = if logged_in {
        r#"<a href="/">Home</a> <a href="/secrets">Secrets</a> <a href="/logout">Log Out</a>"#
    } else {
        r#"<a href="/">Home</a> <a href="/login">Login</a> <a href="/register">Register</a>"#
    };
    let flash = flash
        .map(|m| format!(r#"<p class="flash">{}</p>"#, escape(m)))
        .unwrap_or_default();
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n\
         <body>\n<nav>{nav}</nav>\n{flash}\n{body}\n</body>\n</html>\n",
        title = escape(title),
    ))
}

pub fn home(logged_in: bool, flash: Option<&str>) -> Html<String> {
    let status = if logged_in {
        "<p>You are logged in.</p>"
    } else {
        "<p>You are not logged in.</p>"
    };
    layout(
        "Home",
        logged_in,
        flash,
        &format!("<h1>Welcome</h1>\n{}", status),
    )
}

pub fn register(logged_in: bool, flash: Option<&str>) -> Html<String> {
    layout(
        "Register",
        logged_in,
        flash,
        r#"<h1>Register</h1>
<form action="/register" method="post">
  <input type="text" name="name" placeholder="Name" required>
  <input type="email" name="email" placeholder="Email" required>
  <input type="password" name="password" placeholder="Password" required>
  <button type="submit">Sign me up.</button>
</form>"#,
    )
}

pub fn login(logged_in: bool, flash: Option<&str>) -> Html<String> {
    layout(
        "Login",
        logged_in,
        flash,
        r#"<h1>Login</h1>
<form action="/login" method="post">
  <input type="email" name="email" placeholder="Email" required>
  <input type="password" name="password" placeholder="Password" required>
  <button type="submit">Let me in.</button>
</form>"#,
    )
}

pub fn secrets(name: &str, flash: Option<&str>) -> Html<String> {
    layout(
        "Secrets",
        true,
        flash,
        &format!(
            r#"<h1>Welcome, {}</h1>
<p>You've got access to the cheat sheet.</p>
<a href="/download">Download Your File</a>"#,
            escape(name)
        ),
    )
}

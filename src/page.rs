use std::fmt::Write;

/// Result block of a successful lookup, already formatted for display.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteView {
    pub chain: String,
    pub market: String,
    pub token: String,
    pub address: String,
    pub protocol_pct: String,
    pub incentive_pct: String,
    pub total_pct: String,
}

#[derive(Debug, Clone, Default)]
pub struct IndexPage {
    pub chains: Vec<String>,
    pub chain: String,
    pub tokens: Vec<String>,
    pub token: String,
    pub result: Option<QuoteView>,
    pub error: Option<String>,
}

pub fn escape_html(raw: &str) -> String {
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

fn options(out: &mut String, values: &[String], selected: &str) {
    for value in values {
        let value = escape_html(value);
        let marker = if value == escape_html(selected) {
            " selected"
        } else {
            ""
        };
        let _ = writeln!(out, r#"        <option value="{0}"{1}>{0}</option>"#, value, marker);
    }
}

impl IndexPage {
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(2048);

        out.push_str(
            r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Aave Borrow Rate</title>
  <style>
    body { font-family: sans-serif; max-width: 40rem; margin: 2rem auto; }
    table { border-collapse: collapse; margin-top: 1rem; }
    td { padding: 0.25rem 0.75rem; border-bottom: 1px solid #ddd; }
    .error { color: #b00020; margin-top: 1rem; }
  </style>
</head>
<body>
  <h1>Aave Borrow Rate</h1>
  <form method="post" action="/fetch">
    <label>Chain
      <select name="chain" onchange="window.location='/?chain='+encodeURIComponent(this.value)">
"#,
        );
        options(&mut out, &self.chains, &self.chain);
        out.push_str(
            r#"      </select>
    </label>
    <label>Token
      <select name="token">
"#,
        );
        options(&mut out, &self.tokens, &self.token);
        out.push_str(
            r#"      </select>
    </label>
    <button type="submit">Fetch</button>
  </form>
"#,
        );

        if let Some(result) = &self.result {
            let rows = [
                ("Chain", &result.chain),
                ("Market", &result.market),
                ("Token", &result.token),
                ("Token address", &result.address),
                ("Protocol APY", &result.protocol_pct),
                ("Incentive APY", &result.incentive_pct),
                ("Net borrow APY", &result.total_pct),
            ];
            out.push_str("  <table>\n");
            for (label, value) in rows {
                let _ = writeln!(
                    out,
                    "    <tr><td>{}</td><td>{}</td></tr>",
                    label,
                    escape_html(value)
                );
            }
            out.push_str("  </table>\n");
        }

        if let Some(error) = &self.error {
            let _ = writeln!(out, r#"  <p class="error">{}</p>"#, escape_html(error));
        }

        out.push_str("</body>\n</html>\n");
        out
    }
}

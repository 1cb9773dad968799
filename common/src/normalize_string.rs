pub trait NormalizeString {
    /// Converts `\r\n` and lone `\r` to `\n` and guarantees a trailing `\n`.
    fn normalize(&self) -> String;

    /// Like [`NormalizeString::normalize`], but also strips the indentation common to
    /// all non-blank lines and drops leading and trailing blank lines.
    fn dedent(&self) -> String;
}

impl NormalizeString for str {
    fn normalize(&self) -> String {
        let mut out = self.replace("\r\n", "\n").replace('\r', "\n");
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    fn dedent(&self) -> String {
        let normalized = self.normalize();
        let lines: Vec<&str> = normalized.lines().collect();

        let start = lines.iter().position(|l| !l.trim().is_empty());
        let end = lines.iter().rposition(|l| !l.trim().is_empty());
        let (Some(start), Some(end)) = (start, end) else {
            return "\n".to_string();
        };
        let lines = &lines[start..=end];

        let indent = lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.bytes().take_while(|b| matches!(*b, b' ' | b'\t')).count())
            .min()
            .unwrap_or(0);

        let mut out = String::with_capacity(normalized.len());
        for line in lines {
            if line.trim().is_empty() {
                out.push('\n');
            } else {
                out.push_str(line[indent..].trim_end());
                out.push('\n');
            }
        }
        out
    }
}

impl NormalizeString for String {
    fn normalize(&self) -> String {
        self.as_str().normalize()
    }

    fn dedent(&self) -> String {
        self.as_str().dedent()
    }
}

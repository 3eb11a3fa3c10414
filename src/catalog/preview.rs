/// Free preview of a markdown document: everything before the second `## ` heading.
pub fn first_section(content: &str) -> String {
    let mut sections = 0;
    let mut lines = Vec::new();
    for line in content.lines() {
        if line.starts_with("## ") {
            if sections > 0 {
                break;
            }
            sections += 1;
        }
        lines.push(line);
    }
    lines.join("\n")
}

pub fn build_preview(id: &str, price: u64, content: &str) -> String {
    format!(
        "{}\n\n---\n*[Preview only. Full content: {} sats via L402 at /items/{}]*",
        first_section(content),
        price,
        id
    )
}

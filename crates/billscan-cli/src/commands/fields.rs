use billscan::available_fields;

pub fn run() {
    let fields = available_fields();
    let width = fields.iter().map(|f| f.key.len()).max().unwrap_or(0);
    for field in fields {
        println!("{:width$}  {}", field.key, field.label, width = width);
    }
}

use alacran_build::TemplateCatalog;

pub fn templates() {
    println!("Built-in templates (templateId = <language>/<version>):");
    for language in TemplateCatalog::builtin().languages() {
        println!("  {language}/<version>");
    }
}

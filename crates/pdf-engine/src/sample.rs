use crate::EngineError;
use lopdf::{dictionary, Document, Object};

/// Serializes a content-free PDF whose pages have the given sizes in points.
///
/// Used to produce fixtures and demo documents without shipping binaries.
pub fn write_blank_document(page_sizes: &[(f32, f32)]) -> Result<Vec<u8>, EngineError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = page_sizes
        .iter()
        .map(|&(width, height)| {
            doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Real(width),
                    Object::Real(height),
                ],
            })
            .into()
        })
        .collect();

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => Object::Integer(kids.len() as i64),
        "Kids" => kids,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_document_has_pdf_header() {
        let bytes = write_blank_document(&[(100.0, 200.0)]).unwrap();

        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn test_blank_document_page_count() {
        let bytes = write_blank_document(&[(100.0, 200.0); 3]).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();

        assert_eq!(doc.get_pages().len(), 3);
    }
}

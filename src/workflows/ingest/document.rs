use std::io::Read;
use std::path::Path;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ENCRYPT_MARKER: &[u8] = b"/Encrypt";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentProbe {
    pub is_pdf: bool,
    pub encrypted: bool,
    pub bytes: u64,
}

/// Diagnostic look at a placed document. Never used to decide placement.
pub trait DocumentReader {
    fn probe(&self, path: &Path) -> std::io::Result<DocumentProbe>;
}

/// Checks the PDF header and looks for an encryption dictionary.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfHeaderProbe;

impl DocumentReader for PdfHeaderProbe {
    fn probe(&self, path: &Path) -> std::io::Result<DocumentProbe> {
        let mut contents = Vec::new();
        std::fs::File::open(path)?.read_to_end(&mut contents)?;

        Ok(DocumentProbe {
            is_pdf: contents.starts_with(PDF_MAGIC),
            encrypted: contents
                .windows(ENCRYPT_MARKER.len())
                .any(|window| window == ENCRYPT_MARKER),
            bytes: contents.len() as u64,
        })
    }
}

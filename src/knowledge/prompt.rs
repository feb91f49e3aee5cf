/// Builds the instruction prompt sent to the model for one question.
///
/// The model is told to answer only from `context` and to cite documents as
/// `[Document: filename]`, which the terminal renderer turns into badges.
pub fn build_prompt(query: &str, context: &str) -> String {
    format!(
        "You are a precise and helpful assistant that answers questions based ONLY on the provided documents.

QUESTION: {query}

DOCUMENTS:
 {context}

REQUIREMENTS:
1. Answer the question directly and specifically (around 200 words)
2. Use proper headings and structure (H2 for main points, H3 for sub-points)
3. Use bullet points for lists when appropriate
4. Include citations like [Document: filename] when referencing information
5. Be concise but comprehensive
6. If information is not in the documents, say \"I couldn't find this information in the provided documents\"

FORMAT YOUR RESPONSE AS:
## Main Answer
[Brief direct answer to the question]

### Key Points
• Point 1 with citation
• Point 2 with citation
• Point 3 with citation

### Additional Details
[Any relevant additional information with citations]"
    )
}

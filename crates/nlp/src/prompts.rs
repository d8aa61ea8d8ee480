//! Prompt builders for the three analysis tasks
//!
//! Prompts pin the output to a JSON object so the reply parser can stay
//! strict about shape while lenient about wrapping.

use localfind_normalize::Taxonomy;

pub const SYSTEM: &str = "You analyze business-search queries for a local discovery service in \
India. Reply with a single JSON object and nothing else.";

/// Intent detection prompt. The six tokens are enumerated; anything else in
/// the reply is treated as unknown.
pub fn intent_prompt(query: &str) -> String {
    format!(
        "Classify the intent of this business-search query.\n\
         Query: \"{query}\"\n\n\
         Allowed intents: search, book, compare, review, directions, unknown.\n\
         - search: find businesses or places\n\
         - book: make a reservation or appointment\n\
         - compare: weigh options against each other\n\
         - review: read or leave reviews\n\
         - directions: navigate to a known place\n\n\
         Reply as JSON: {{\"intent\": \"<token>\", \"confidence\": <0.0-1.0>}}"
    )
}

/// Category classification prompt: lists the root taxonomy ids plus a
/// curated block of conversational examples.
pub fn category_prompt(query: &str, taxonomy: &Taxonomy) -> String {
    let roots = taxonomy.root_ids().join(", ");
    format!(
        "Pick the best business category for this query.\n\
         Query: \"{query}\"\n\n\
         Categories: {roots}\n\n\
         Conversational examples:\n\
         - \"I'm hungry\" -> food\n\
         - \"i could use a coffee\" -> cafe\n\
         - \"where to work out\" -> fitness\n\
         - \"need a haircut\" -> beauty\n\
         - \"my car is making a noise\" -> automotive\n\
         - \"kids need maths help\" -> education\n\
         - \"something fun tonight\" -> entertainment\n\
         - \"medicine for a headache\" -> health\n\n\
         Reply as JSON: {{\"category\": \"<id>\", \"confidence\": <0.0-1.0>, \
         \"alternatives\": [\"<id>\", ...]}} with at most 3 alternatives."
    )
}

/// Entity extraction prompt.
pub fn entities_prompt(query: &str) -> String {
    format!(
        "Extract entities from this business-search query.\n\
         Query: \"{query}\"\n\n\
         Entity lists:\n\
         - locations: city, neighbourhood, or area names\n\
         - business_names: proper names of specific businesses\n\
         - times: times, days, or phrases like \"open now\"\n\
         - prices: price words (cheap, budget, expensive, luxury) or $ tiers\n\
         - features: amenities or attributes (parking, wifi, outdoor seating)\n\n\
         Reply as JSON: {{\"locations\": [], \"business_names\": [], \"times\": [], \
         \"prices\": [], \"features\": [], \"confidence\": <0.0-1.0>}}.\n\
         Use empty lists for absent entity kinds. Never invent entities."
    )
}

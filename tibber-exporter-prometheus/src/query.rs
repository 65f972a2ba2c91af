//! GraphQL query document sent on every scrape.

/// Homes, current price and the latest hourly consumption of the viewer.
pub const HOMES_QUERY: &str = r#"
{
  viewer {
    name
    homes {
      id
      timeZone
      address {
        address1
        address2
        address3
        postalCode
        city
        country
        latitude
        longitude
      }
      owner {
        firstName
        lastName
        contactInfo {
          email
          mobile
        }
      }
      currentSubscription {
        priceInfo {
          current {
            total
            energy
            tax
            currency
            startsAt
            level
          }
        }
      }
      consumption(resolution: HOURLY, last: 1) {
        nodes {
          from
          to
          totalCost
          unitCost
          unitPrice
          unitPriceVAT
          consumption
          consumptionUnit
          currency
        }
      }
    }
  }
}
"#;
